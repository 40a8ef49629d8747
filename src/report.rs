use crate::grading::{status_label, CourseType, SymbolicGrade};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One stored grade as seen by the reporting surfaces. `symbolic_grade` is
/// the label exactly as persisted, which for older workspaces may still use
/// the D/M/P/NA scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub student_id: String,
    pub student_name: String,
    pub year_level: i64,
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub course_type: Option<CourseType>,
    pub total_score: Option<f64>,
    pub symbolic_grade: Option<String>,
    pub leniency_applied: bool,
}

impl GradeRecord {
    pub fn status_display(&self) -> &'static str {
        status_label(self.total_score.is_some())
    }

    fn canonical_grade(&self) -> Option<SymbolicGrade> {
        self.symbolic_grade.as_deref().and_then(canonical_for_label)
    }

    fn is_failing(&self) -> bool {
        self.canonical_grade().map(|g| !g.is_passing()).unwrap_or(false)
    }
}

/// Labels written by the older D/M/P/NA naming scheme: Distinction, Merit,
/// Pass, Not Achieved. That scheme had no counterpart for Good.
const LEGACY_LABELS: [(&str, SymbolicGrade); 4] = [
    ("D", SymbolicGrade::Excellent),
    ("M", SymbolicGrade::VeryGood),
    ("P", SymbolicGrade::Pass),
    ("NA", SymbolicGrade::Fail),
];

/// Stored label -> canonical grade, accepting both naming schemes. Matching
/// is exact and case-sensitive.
pub fn canonical_for_label(label: &str) -> Option<SymbolicGrade> {
    SymbolicGrade::from_label(label).or_else(|| {
        LEGACY_LABELS
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, g)| *g)
    })
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPercentages {
    pub excellent: f64,
    pub very_good: f64,
    pub good: f64,
    pub pass: f64,
    pub fail: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeDistribution {
    pub excellent: usize,
    pub very_good: usize,
    pub good: usize,
    pub pass: usize,
    pub fail: usize,
    pub total: usize,
    pub percentages: BucketPercentages,
}

pub fn grade_distribution(records: &[GradeRecord]) -> GradeDistribution {
    let mut dist = GradeDistribution::default();
    for r in records {
        let Some(label) = r.symbolic_grade.as_deref() else {
            continue;
        };
        dist.total += 1;
        match canonical_for_label(label) {
            Some(SymbolicGrade::Excellent) => dist.excellent += 1,
            Some(SymbolicGrade::VeryGood) => dist.very_good += 1,
            Some(SymbolicGrade::Good) => dist.good += 1,
            Some(SymbolicGrade::Pass) => dist.pass += 1,
            Some(SymbolicGrade::Fail) => dist.fail += 1,
            None => {
                tracing::debug!(label, student = %r.student_id, "unrecognised grade label");
            }
        }
    }
    dist.percentages = BucketPercentages {
        excellent: rate(dist.excellent, dist.total),
        very_good: rate(dist.very_good, dist.total),
        good: rate(dist.good, dist.total),
        pass: rate(dist.pass, dist.total),
        fail: rate(dist.fail, dist.total),
    };
    dist
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePerformance {
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    /// Mean total in the course's native scale; 100- and 150-point courses
    /// are not comparable on this axis.
    pub average_score: f64,
    pub student_count: usize,
    pub pass_rate: f64,
}

pub fn course_performance(records: &[GradeRecord]) -> Vec<CoursePerformance> {
    // course_id -> (code, name, sum, count, passed)
    let mut groups: HashMap<&str, (&str, &str, f64, usize, usize)> = HashMap::new();
    for r in records {
        let Some(total) = r.total_score else {
            continue;
        };
        let entry = groups
            .entry(r.course_id.as_str())
            .or_insert((r.course_code.as_str(), r.course_name.as_str(), 0.0, 0, 0));
        entry.2 += total;
        entry.3 += 1;
        if !r.is_failing() {
            entry.4 += 1;
        }
    }

    let mut out: Vec<CoursePerformance> = groups
        .into_iter()
        .map(|(id, (code, name, sum, count, passed))| CoursePerformance {
            course_id: id.to_string(),
            course_code: code.to_string(),
            course_name: name.to_string(),
            average_score: sum / count as f64,
            student_count: count,
            pass_rate: rate(passed, count),
        })
        .collect();
    out.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.course_id.cmp(&b.course_id))
    });
    out
}

/// GPA on the 4.0 scale over completed grades. Zero completed grades is a
/// GPA of exactly 0.0.
pub fn student_gpa(records: &[GradeRecord]) -> f64 {
    let mut points = 0.0_f64;
    let mut count = 0_usize;
    for r in records {
        if r.total_score.is_none() || r.symbolic_grade.is_none() {
            continue;
        }
        points += r.canonical_grade().map(|g| g.grade_points()).unwrap_or(0.0);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        points / count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeniencyStats {
    pub total_graded: usize,
    pub leniency_applied: usize,
    pub leniency_rate: f64,
}

pub fn leniency_stats(records: &[GradeRecord]) -> LeniencyStats {
    let graded: Vec<&GradeRecord> = records.iter().filter(|r| r.total_score.is_some()).collect();
    let applied = graded.iter().filter(|r| r.leniency_applied).count();
    LeniencyStats {
        total_graded: graded.len(),
        leniency_applied: applied,
        leniency_rate: rate(applied, graded.len()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
    pub student_id: String,
    pub student_name: String,
    pub year_level: i64,
    pub average_score: f64,
    pub courses_completed: usize,
    pub gpa: f64,
}

pub fn student_performance(records: &[GradeRecord]) -> Vec<StudentPerformance> {
    let mut by_student: HashMap<&str, Vec<GradeRecord>> = HashMap::new();
    for r in records.iter().filter(|r| r.total_score.is_some()) {
        by_student
            .entry(r.student_id.as_str())
            .or_default()
            .push(r.clone());
    }

    let mut out: Vec<StudentPerformance> = by_student
        .into_iter()
        .map(|(id, grades)| {
            let sum: f64 = grades.iter().filter_map(|g| g.total_score).sum();
            StudentPerformance {
                student_id: id.to_string(),
                student_name: grades[0].student_name.clone(),
                year_level: grades[0].year_level,
                average_score: sum / grades.len() as f64,
                courses_completed: grades.len(),
                gpa: student_gpa(&grades),
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    out
}

pub fn top_students(records: &[GradeRecord], count: usize) -> Vec<StudentPerformance> {
    let mut all = student_performance(records);
    all.truncate(count);
    all
}
