//! Attribute names of the server markup and small HTML text helpers.

pub const ATTR_METRIC: &str = "data-metric";
pub const ATTR_CHART_TYPE: &str = "data-chart-type";
pub const ATTR_TITLE: &str = "data-title";
pub const ATTR_TREND_KEY: &str = "data-trend-key";
pub const ATTR_TREND_UNITS: &str = "data-trend-units";
pub const ATTR_TAB: &str = "data-tab";
pub const ATTR_LOADING_TARGET: &str = "data-loading-target";
/// Set on a form once its submit handler is attached.
pub const ATTR_LISTENER_BOUND: &str = "data-listener-bound";

pub const ACTIVE_CLASS: &str = "active";
pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";

/// Escape text for interpolation into HTML.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escaped text with line breaks turned into `<br>`.
pub fn text_with_breaks(s: &str) -> String {
    s.split('\n')
        .map(|line| escape_html(line.strip_suffix('\r').unwrap_or(line)))
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Text content of the `<script>` element with the given id in a saved page.
pub fn extract_script_payload<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    let needles = [format!("id=\"{id}\""), format!("id='{id}'")];
    let mut search_from = 0;
    while search_from < html.len() {
        let rest = &html[search_from..];
        let found = needles.iter().filter_map(|n| rest.find(n.as_str())).min()?;
        let attr_at = search_from + found;
        let tag_start = html[..attr_at].rfind('<')?;
        let tag = &html[tag_start..attr_at];
        if tag.get(..7).is_some_and(|t| t.eq_ignore_ascii_case("<script")) {
            let open_end = attr_at + html[attr_at..].find('>')? + 1;
            let close = find_ignore_case(&html[open_end..], "</script")?;
            return Some(html[open_end..open_end + close].trim());
        }
        search_from = attr_at + 1;
    }
    None
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let lower = haystack.to_ascii_lowercase();
    lower.find(&needle.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_and_breaks_lines() {
        assert_eq!(escape_html("<b>R&D</b>"), "&lt;b&gt;R&amp;D&lt;/b&gt;");
        assert_eq!(text_with_breaks("one\r\ntwo\n<three>"), "one<br>two<br>&lt;three&gt;");
    }

    #[test]
    fn extracts_script_payloads_only() {
        let page = r#"
            <div id="dcf-results-data">not a script</div>
            <script type="application/json" id="dcf-results-data">
              {"2025": 101.5}
            </script>
            <SCRIPT id='transcripts-data' type="application/json">[]</SCRIPT>
        "#;
        assert_eq!(extract_script_payload(page, "dcf-results-data"), Some(r#"{"2025": 101.5}"#));
        assert_eq!(extract_script_payload(page, "transcripts-data"), Some("[]"));
        assert_eq!(extract_script_payload(page, "metric-trends-data"), None);
    }
}
