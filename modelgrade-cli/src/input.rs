//! URL file parsing.
//!
//! Each meaningful line is `code_url,dataset_url,model_url`. Cells may be
//! empty; a line with fewer than three cells treats its last cell as the model.

use std::path::Path;

/// One scoring request read from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlLine {
    pub code: Option<String>,
    pub dataset: Option<String>,
    pub model: String,
}

fn cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse a single line. Blank lines, comments and lines without a model cell
/// yield `None`.
pub fn parse_line(line: &str) -> Option<UrlLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let cells: Vec<&str> = line.split(',').collect();
    let parsed = match cells.as_slice() {
        [code, dataset, model, ..] => UrlLine {
            code: cell(code),
            dataset: cell(dataset),
            model: cell(model)?,
        },
        [.., last] => UrlLine {
            code: None,
            dataset: None,
            model: cell(last)?,
        },
        [] => return None,
    };
    Some(parsed)
}

pub fn parse_lines(text: &str) -> Vec<UrlLine> {
    text.lines().filter_map(parse_line).collect()
}

pub fn read_url_file(path: &Path) -> std::io::Result<Vec<UrlLine>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_lines(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_three_cells() {
        let line = parse_line(
            "https://github.com/google-research/bert, https://huggingface.co/datasets/bookcorpus/bookcorpus, https://huggingface.co/google-bert/bert-base-uncased",
        )
        .unwrap();
        assert_eq!(line.code.as_deref(), Some("https://github.com/google-research/bert"));
        assert_eq!(
            line.dataset.as_deref(),
            Some("https://huggingface.co/datasets/bookcorpus/bookcorpus")
        );
        assert_eq!(line.model, "https://huggingface.co/google-bert/bert-base-uncased");
    }

    #[test]
    fn test_empty_cells() {
        let line = parse_line(",,https://huggingface.co/openai/whisper-tiny").unwrap();
        assert_eq!(
            line,
            UrlLine {
                code: None,
                dataset: None,
                model: "https://huggingface.co/openai/whisper-tiny".into(),
            }
        );
    }

    #[test]
    fn test_short_lines_use_last_cell() {
        assert_eq!(parse_line("https://huggingface.co/gpt2").unwrap().model, "https://huggingface.co/gpt2");
        let two = parse_line("https://github.com/a/b,https://huggingface.co/org/m").unwrap();
        assert_eq!(two.model, "https://huggingface.co/org/m");
        assert_eq!(two.code, None);
    }

    #[test]
    fn test_skips_blank_comment_and_modelless_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# header"), None);
        assert_eq!(parse_line("https://github.com/a/b,,"), None);
    }

    #[test]
    fn test_read_url_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# models").unwrap();
        writeln!(file, ",,https://huggingface.co/org/a").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "https://huggingface.co/org/b").unwrap();
        let lines = read_url_file(file.path()).unwrap();
        let models: Vec<&str> = lines.iter().map(|l| l.model.as_str()).collect();
        assert_eq!(models, vec!["https://huggingface.co/org/a", "https://huggingface.co/org/b"]);

        assert!(read_url_file(Path::new("/definitely/not/here.txt")).is_err());
    }
}
