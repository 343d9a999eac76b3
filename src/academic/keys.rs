//! 派生键：同一目标的重复创建（工具或自动建议）落到同一个键上，从而保证幂等

pub fn study_block_for_assignment(assignment_id: &str) -> String {
    format!("study_block:assignment:{assignment_id}")
}

pub fn study_block_for_exam(exam_id: &str) -> String {
    format!("study_block:exam:{exam_id}")
}

/// 未关联作业 / 考试的学习时段：按标题与开始时间派生
pub fn study_block_adhoc(title: &str, starts_at: &chrono::DateTime<chrono::Utc>) -> String {
    let slug: String = title
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("study_block:adhoc:{slug}:{}", starts_at.timestamp())
}

pub fn flashcards_for_notes(course_id: &str) -> String {
    format!("flashcards:notes:{course_id}")
}

pub fn material_link(material_id: &str, target_id: &str) -> String {
    format!("link:{material_id}:{target_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_adhoc_key_normalizes_title() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(
            study_block_adhoc("  Review   Week 3 ", &at),
            study_block_adhoc("review week 3", &at)
        );
        assert_ne!(study_block_for_assignment("a1"), study_block_for_exam("a1"));
    }
}
