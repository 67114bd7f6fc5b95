use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::config::{BOS, EOS, PAD};
use super::model::VitsError;

/// How to invoke espeak-ng.
#[derive(Debug, Clone)]
pub struct Espeak {
    /// Binary to run. `None` uses `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// Passed as `ESPEAK_DATA_PATH` when set.
    pub data_path: Option<PathBuf>,
    /// espeak-ng voice, e.g. `"en-us"` or `"en-gb-x-rp"`.
    pub voice: String,
}

impl Espeak {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            bin_path: None,
            data_path: None,
            voice: voice.into(),
        }
    }

    /// Convert text to an IPA phoneme string, keeping clause punctuation.
    pub fn phonemize(&self, text: &str) -> Result<String, VitsError> {
        let clauses = split_clauses(text);
        let spoken: Vec<&str> = clauses
            .iter()
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        if spoken.is_empty() {
            return Ok(String::new());
        }

        let output = self.run(&spoken.join("\n"))?;
        let lines: Vec<&str> = output.lines().map(str::trim).collect();
        // espeak-ng may split a line on its own clause rules; redo one by one
        if lines.len() != spoken.len() {
            let per_clause = spoken
                .iter()
                .map(|clause| self.run(clause))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(join_clauses(&clauses, per_clause.iter().map(|s| s.trim())));
        }

        Ok(join_clauses(&clauses, lines.into_iter()))
    }

    fn run(&self, input: &str) -> Result<String, VitsError> {
        let program = self
            .bin_path
            .as_deref()
            .map(|p| p.as_os_str())
            .unwrap_or_else(|| "espeak-ng".as_ref());

        let mut command = Command::new(program);
        command
            .args(["--ipa", "--stdin", "-q", "-v", self.voice.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(data) = &self.data_path {
            command.env("ESPEAK_DATA_PATH", data);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VitsError::EspeakNotFound
            } else {
                VitsError::Io(e)
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(newline_terminated(input).as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VitsError::PhonemizerFailed(format!(
                "espeak-ng exited with code {:?}: {stderr}",
                output.status.code()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Map phonemes to model ids: `^`, then every known phoneme followed by the
/// pad id, then `$`. Unknown phonemes are dropped.
pub fn phonemes_to_ids(phonemes: &str, id_map: &HashMap<char, Vec<i64>>) -> Vec<i64> {
    let lookup = |symbol: char| id_map.get(&symbol).map(Vec::as_slice).unwrap_or(&[]);
    let pad = lookup(PAD);

    let mut ids = Vec::with_capacity(phonemes.len() * 2 + 3);
    ids.extend_from_slice(lookup(BOS));
    ids.extend_from_slice(pad);
    for ch in phonemes.chars() {
        match id_map.get(&ch) {
            Some(phoneme) => {
                ids.extend_from_slice(phoneme);
                ids.extend_from_slice(pad);
            }
            None => log::debug!("No id for phoneme {ch:?}, skipping"),
        }
    }
    ids.extend_from_slice(lookup(EOS));
    ids
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    text: String,
    /// Punctuation that closed the clause, if any.
    punct: Option<char>,
}

fn split_clauses(text: &str) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if matches!(ch, '.' | '!' | '?' | ',' | ';' | ':') {
            clauses.push(Clause {
                text: collapse_whitespace(&current),
                punct: Some(ch),
            });
            current.clear();
        } else {
            current.push(ch);
        }
    }

    let rest = collapse_whitespace(&current);
    if !rest.is_empty() {
        clauses.push(Clause {
            text: rest,
            punct: None,
        });
    }
    clauses
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reassemble phonemized clauses, putting punctuation back after each one.
fn join_clauses<'a>(clauses: &[Clause], mut phonemized: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for clause in clauses {
        if !clause.text.is_empty() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            out.push_str(phonemized.next().unwrap_or_default());
        }
        if let Some(p) = clause.punct {
            out.push(p);
        }
    }
    out
}

/// espeak-ng reads stdin line by line and can under-process a final line
/// without a terminator.
fn newline_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_map() -> HashMap<char, Vec<i64>> {
        [('_', 0), ('^', 1), ('$', 2), (' ', 3), ('h', 20), ('ə', 59), ('l', 24), ('ˈ', 120)]
            .into_iter()
            .map(|(c, id)| (c, vec![id]))
            .collect()
    }

    fn espeak_installed() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn intersperses_padding() {
        assert_eq!(phonemes_to_ids("hə", &id_map()), vec![1, 0, 20, 0, 59, 0, 2]);
    }

    #[test]
    fn unknown_phonemes_are_dropped() {
        assert_eq!(phonemes_to_ids("hxl", &id_map()), vec![1, 0, 20, 0, 24, 0, 2]);
    }

    #[test]
    fn empty_phonemes_still_framed() {
        assert_eq!(phonemes_to_ids("", &id_map()), vec![1, 0, 2]);
    }

    #[test]
    fn splits_on_punctuation() {
        assert_eq!(
            split_clauses("Hello,  Airi!"),
            vec![
                Clause {
                    text: "Hello".to_string(),
                    punct: Some(','),
                },
                Clause {
                    text: "Airi".to_string(),
                    punct: Some('!'),
                },
            ]
        );
    }

    #[test]
    fn trailing_text_has_no_punct() {
        assert_eq!(
            split_clauses("Hello Airi"),
            vec![Clause {
                text: "Hello Airi".to_string(),
                punct: None,
            }]
        );
    }

    #[test]
    fn rejoins_clauses_with_punctuation() {
        let clauses = split_clauses("Hello, Airi.");
        let joined = join_clauses(&clauses, ["həlˈoʊ", "ˈɛəɹi"].into_iter());
        assert_eq!(joined, "həlˈoʊ, ˈɛəɹi.");
    }

    #[test]
    fn appends_trailing_newline() {
        assert_eq!(newline_terminated("Airi"), "Airi\n");
        assert_eq!(newline_terminated("Airi\n"), "Airi\n");
    }

    #[test]
    fn phonemizes_wake_word() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if !espeak_installed() {
            return;
        }

        let phonemes = Espeak::new("en-us")
            .phonemize("Hello Airi")
            .expect("espeak should succeed");
        assert!(!phonemes.is_empty());
        assert!(phonemes.contains('h'));
    }

    #[test]
    fn missing_binary_is_reported() {
        let espeak = Espeak {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            ..Espeak::new("en-us")
        };
        assert!(matches!(
            espeak.phonemize("Hello"),
            Err(VitsError::EspeakNotFound)
        ));
    }
}
