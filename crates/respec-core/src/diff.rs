//! Unified diff rendering for applied edits.
//!
//! Edits on the same or neighbouring lines are merged into one hunk. Hunks
//! show whole lines, without extra context lines.

use crate::patch::OutputEdit;
use crate::text::line_start_of;

/// A run of whole original lines touched by one or more edits.
struct Hunk<'a> {
    start: usize,
    end: usize,
    edits: Vec<&'a OutputEdit>,
}

/// End of the line containing `offset`, including its newline.
fn line_end_of(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[offset..]
        .find('\n')
        .map(|i| offset + i + 1)
        .unwrap_or(content.len())
}

fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.lines().count()
    }
}

fn push_lines(out: &mut String, prefix: char, text: &str) {
    for line in text.lines() {
        out.push(prefix);
        out.push_str(line);
        out.push('\n');
    }
    if !text.is_empty() && !text.ends_with('\n') {
        out.push_str("\\ No newline at end of file\n");
    }
}

/// Render the diff of one file given its original text and the edits
/// applied to it. Edits must be non-overlapping; order does not matter.
pub fn file_diff(path: &str, original: &str, edits: &[OutputEdit]) -> String {
    if edits.is_empty() {
        return String::new();
    }

    let mut ordered: Vec<&OutputEdit> = edits.iter().collect();
    ordered.sort_by_key(|e| e.span.start);

    let mut hunks: Vec<Hunk> = Vec::new();
    for edit in ordered {
        let start = line_start_of(original, edit.span.start);
        let end = line_end_of(original, edit.span.end);
        match hunks.last_mut() {
            Some(hunk) if start <= hunk.end => {
                hunk.end = hunk.end.max(end);
                hunk.edits.push(edit);
            }
            _ => hunks.push(Hunk {
                start,
                end,
                edits: vec![edit],
            }),
        }
    }

    let mut diff = format!("--- a/{}\n+++ b/{}\n", path, path);
    let mut line_delta: isize = 0;
    for hunk in hunks {
        let old_region = &original[hunk.start..hunk.end];
        let mut new_region = String::new();
        let mut cursor = hunk.start;
        for edit in &hunk.edits {
            new_region.push_str(&original[cursor..edit.span.start]);
            new_region.push_str(&edit.new_text);
            cursor = edit.span.end;
        }
        new_region.push_str(&original[cursor..hunk.end]);

        let old_start = original[..hunk.start].matches('\n').count() + 1;
        let old_count = count_lines(old_region);
        let new_count = count_lines(&new_region);
        let new_start = (old_start as isize + line_delta).max(1);

        diff.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_start, old_count, new_start, new_count
        ));
        push_lines(&mut diff, '-', old_region);
        push_lines(&mut diff, '+', &new_region);
        line_delta += new_count as isize - old_count as isize;
    }

    diff
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{materialize, Replacement, Span};

    const SOURCE: &str = "describe Foo do\n  it { x.should == 1 }\n\n  it { y.should be_true }\nend\n";

    fn edits_for(replacements: &[Replacement]) -> Vec<OutputEdit> {
        materialize("spec/foo_spec.rb", SOURCE, replacements)
    }

    #[test]
    fn single_line_hunk() {
        let start = SOURCE.find("be_true").unwrap();
        let edits = edits_for(&[Replacement::replace(
            Span::new(start, start + 7),
            "be_truthy",
        )]);
        let diff = file_diff("spec/foo_spec.rb", SOURCE, &edits);
        assert_eq!(
            diff,
            "--- a/spec/foo_spec.rb\n+++ b/spec/foo_spec.rb\n\
             @@ -4,1 +4,1 @@\n\
             -  it { y.should be_true }\n\
             +  it { y.should be_truthy }\n"
        );
    }

    #[test]
    fn edits_on_one_line_share_a_hunk() {
        let x = SOURCE.find("x.should").unwrap();
        let should_end = x + "x.should".len();
        let edits = edits_for(&[
            Replacement::insert(x, "expect("),
            Replacement::replace(Span::new(x + 1, should_end), ").to"),
        ]);
        let diff = file_diff("spec/foo_spec.rb", SOURCE, &edits);
        assert_eq!(diff.matches("@@ -").count(), 1);
        assert!(diff.contains("+  it { expect(x).to == 1 }\n"));
    }

    #[test]
    fn line_numbers_shift_after_growing_hunk() {
        let x = SOURCE.find("x.should").unwrap();
        let y = SOURCE.find("be_true").unwrap();
        let edits = edits_for(&[
            Replacement::insert(x, "a\nb\n  "),
            Replacement::replace(Span::new(y, y + 7), "be_truthy"),
        ]);
        let diff = file_diff("spec/foo_spec.rb", SOURCE, &edits);
        assert!(diff.contains("@@ -2,1 +2,3 @@"));
        assert!(diff.contains("@@ -4,1 +6,1 @@"));
    }

    #[test]
    fn no_edits_no_diff() {
        assert!(file_diff("spec/foo_spec.rb", SOURCE, &[]).is_empty());
    }
}
