//! Plain-text output.
//!
//! ```text
//! PDF OCR 결과
//! ==================================================
//! 총 페이지 수: 2
//! ==================================================
//!
//! 페이지 1
//! --------------------
//! first page text
//! ==================================================
//! 페이지 2
//! --------------------
//! second page text
//!
//! ==================================================
//! 처리 완료: 2페이지
//! ```

use crate::output::BatchResults;
use crate::render::{page_body, page_heading, TITLE};

const RULE_WIDTH: usize = 50;
const HEADING_RULE_WIDTH: usize = 20;

/// Separator written between consecutive pages (never after the last).
pub fn page_separator() -> String {
    format!("\n{}\n", "=".repeat(RULE_WIDTH))
}

pub fn render_text(results: &BatchResults, include_page_numbers: bool) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let total = results.len();
    let separator = page_separator();

    let mut out = String::new();
    out.push_str(TITLE);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("총 페이지 수: {}\n", total));
    out.push_str(&rule);
    out.push_str("\n\n");

    for (n, (_, result)) in results.iter().enumerate() {
        if n > 0 {
            out.push_str(&separator);
        }
        if include_page_numbers {
            out.push_str(&page_heading(result.page));
            out.push('\n');
            out.push_str(&"-".repeat(HEADING_RULE_WIDTH));
            out.push('\n');
        }
        out.push_str(&page_body(result));
    }

    out.push_str("\n\n");
    out.push_str(&rule);
    out.push_str(&format!("\n처리 완료: {}페이지", total));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PageResult;

    /// Separator matches outside the header (2) and footer (1) rules.
    fn interior_separators(out: &str) -> usize {
        out.matches(&page_separator()).count() - 3
    }

    fn results(texts: &[&str]) -> BatchResults {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| PageResult::success(i + 1, *t, format!("page_{:04}.png", i + 1)))
            .collect()
    }

    #[test]
    fn exact_layout_for_two_pages() {
        let out = render_text(&results(&["첫 페이지", "둘째 페이지"]), true);
        let rule = "=".repeat(50);
        let dash = "-".repeat(20);
        let expected = format!(
            "PDF OCR 결과\n{rule}\n총 페이지 수: 2\n{rule}\n\n\
             페이지 1\n{dash}\n첫 페이지\n{rule}\n\
             페이지 2\n{dash}\n둘째 페이지\n\n{rule}\n처리 완료: 2페이지"
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn zero_pages_still_has_header_and_footer() {
        let out = render_text(&BatchResults::new(), true);
        assert!(out.contains("총 페이지 수: 0"));
        assert!(out.ends_with("처리 완료: 0페이지"));
        assert!(!out.contains("페이지 1"));
    }

    #[test]
    fn single_page_has_no_interior_separator() {
        let out = render_text(&results(&["only"]), false);
        assert_eq!(interior_separators(&out), 0);
        assert!(out.contains("\n\nonly\n\n"));
    }

    #[test]
    fn pages_appear_in_ascending_order_with_separators() {
        let mut r = BatchResults::new();
        r.insert(2, PageResult::success(3, "C-TEXT", "p3.png"));
        r.insert(0, PageResult::success(1, "A-TEXT", "p1.png"));
        r.insert(1, PageResult::error(2, "rate limited", "p2.png"));
        let out = render_text(&r, true);

        let a = out.find("A-TEXT").unwrap();
        let b = out.find("[오류] rate limited").unwrap();
        let c = out.find("C-TEXT").unwrap();
        assert!(a < b && b < c);
        assert_eq!(interior_separators(&out), 2);
    }

    #[test]
    fn page_numbers_can_be_disabled() {
        let out = render_text(&results(&["x", "y"]), false);
        assert!(!out.contains("페이지 1\n"));
        assert!(!out.contains(&"-".repeat(20)));
    }
}
