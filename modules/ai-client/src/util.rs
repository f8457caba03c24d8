/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Find the first balanced `{...}` object in a model reply.
///
/// Models often wrap JSON in prose ("以下是分析结果：{...}"). Braces inside
/// string literals are ignored.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in response[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn extracts_object_from_prose() {
        let reply = "分析结果如下：{\"sentiment\": \"negative\"} 希望有帮助";
        assert_eq!(
            extract_json_object(reply),
            Some("{\"sentiment\": \"negative\"}")
        );
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let reply = r#"{"key_phrase": "补税}{焦虑", "nested": {"a": 1}} trailing"#;
        assert_eq!(
            extract_json_object(reply),
            Some(r#"{"key_phrase": "补税}{焦虑", "nested": {"a": 1}}"#)
        );
    }

    #[test]
    fn unbalanced_object_returns_none() {
        assert_eq!(extract_json_object("{\"a\": 1"), None);
        assert_eq!(extract_json_object("no json here"), None);
    }
}
