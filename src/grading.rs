use chrono::{DateTime, Utc};

pub const EXCELLENT_THRESHOLD: f64 = 85.0;
pub const VERY_GOOD_THRESHOLD: f64 = 75.0;
pub const GOOD_THRESHOLD: f64 = 65.0;
pub const PASS_THRESHOLD: f64 = 60.0;
pub const LENIENCY_MARGIN: f64 = 2.0;

/// Thresholds paired with the grade they award, highest first.
const GRADE_BANDS: [(f64, SymbolicGrade); 4] = [
    (EXCELLENT_THRESHOLD, SymbolicGrade::Excellent),
    (VERY_GOOD_THRESHOLD, SymbolicGrade::VeryGood),
    (GOOD_THRESHOLD, SymbolicGrade::Good),
    (PASS_THRESHOLD, SymbolicGrade::Pass),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourseType {
    Practical150,
    Practical100,
    Theoretical100,
}

impl CourseType {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseType::Practical150 => "Practical150",
            CourseType::Practical100 => "Practical100",
            CourseType::Theoretical100 => "Theoretical100",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Practical150" => Some(CourseType::Practical150),
            "Practical100" => Some(CourseType::Practical100),
            "Theoretical100" => Some(CourseType::Theoretical100),
            _ => None,
        }
    }

    pub fn max_degree(self) -> f64 {
        match self {
            CourseType::Practical150 => 150.0,
            CourseType::Practical100 | CourseType::Theoretical100 => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Assignment1,
    Assignment2,
    CourseWork,
    FinalExam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradingScheme {
    pub course_type: CourseType,
}

impl GradingScheme {
    pub fn new(course_type: CourseType) -> Self {
        Self { course_type }
    }

    pub fn max_degree(&self) -> f64 {
        self.course_type.max_degree()
    }

    /// Whole-number percent of the total contributed by `component`, or
    /// `None` when the scheme does not use it. Weights sum to 100.
    pub fn weight_percent(&self, component: Component) -> Option<f64> {
        match (self.course_type, component) {
            (CourseType::Theoretical100, Component::Assignment1) => Some(20.0),
            (CourseType::Theoretical100, Component::Assignment2) => Some(20.0),
            (CourseType::Theoretical100, Component::CourseWork) => Some(60.0),
            (CourseType::Theoretical100, Component::FinalExam) => None,
            (_, Component::Assignment1) => Some(20.0),
            (_, Component::Assignment2) => Some(30.0),
            (_, Component::CourseWork) => Some(20.0),
            (_, Component::FinalExam) => Some(30.0),
        }
    }

    pub fn required_components(&self) -> &'static [Component] {
        match self.course_type {
            CourseType::Theoretical100 => &[
                Component::Assignment1,
                Component::Assignment2,
                Component::CourseWork,
            ],
            CourseType::Practical150 | CourseType::Practical100 => &[
                Component::Assignment1,
                Component::Assignment2,
                Component::CourseWork,
                Component::FinalExam,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawScoreSet {
    pub assignment1: Option<f64>,
    pub assignment2: Option<f64>,
    pub course_work: Option<f64>,
    pub final_exam: Option<f64>,
}

impl RawScoreSet {
    pub fn get(&self, component: Component) -> Option<f64> {
        match component {
            Component::Assignment1 => self.assignment1,
            Component::Assignment2 => self.assignment2,
            Component::CourseWork => self.course_work,
            Component::FinalExam => self.final_exam,
        }
    }

    pub fn is_complete_for(&self, scheme: &GradingScheme) -> bool {
        scheme
            .required_components()
            .iter()
            .all(|c| self.get(*c).is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolicGrade {
    Excellent,
    VeryGood,
    Good,
    Pass,
    Fail,
}

impl SymbolicGrade {
    pub fn label(self) -> &'static str {
        match self {
            SymbolicGrade::Excellent => "Excellent",
            SymbolicGrade::VeryGood => "Very Good",
            SymbolicGrade::Good => "Good",
            SymbolicGrade::Pass => "Pass",
            SymbolicGrade::Fail => "Fail",
        }
    }

    /// Canonical labels only. Historical labels are translated by the report
    /// layer, never here.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Excellent" => Some(SymbolicGrade::Excellent),
            "Very Good" => Some(SymbolicGrade::VeryGood),
            "Good" => Some(SymbolicGrade::Good),
            "Pass" => Some(SymbolicGrade::Pass),
            "Fail" => Some(SymbolicGrade::Fail),
            _ => None,
        }
    }

    pub fn is_passing(self) -> bool {
        self != SymbolicGrade::Fail
    }

    /// Points on the 4.0 GPA scale.
    pub fn grade_points(self) -> f64 {
        match self {
            SymbolicGrade::Excellent => 4.0,
            SymbolicGrade::VeryGood => 3.5,
            SymbolicGrade::Good => 3.0,
            SymbolicGrade::Pass => 2.5,
            SymbolicGrade::Fail => 0.0,
        }
    }

    pub fn display_color(grade: Option<Self>) -> &'static str {
        match grade {
            Some(SymbolicGrade::Excellent) => "#4ADE80",
            Some(SymbolicGrade::VeryGood) => "#60A5FA",
            Some(SymbolicGrade::Good) => "#2DD4BF",
            Some(SymbolicGrade::Pass) => "#FBBF24",
            Some(SymbolicGrade::Fail) => "#F87171",
            None => "#A0A0A0",
        }
    }
}

/// Caller identity and clock for a grading pass. Passed in explicitly so the
/// calculator never reaches for ambient session state.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingContext {
    pub graded_by: Option<String>,
    pub graded_at: DateTime<Utc>,
}

impl GradingContext {
    pub fn now(graded_by: Option<String>) -> Self {
        Self {
            graded_by,
            graded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedGrade {
    pub total_score: Option<f64>,
    pub percentage: Option<f64>,
    pub symbolic_grade: Option<SymbolicGrade>,
    pub leniency_applied: bool,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<String>,
}

impl ComputedGrade {
    pub fn ungraded() -> Self {
        Self {
            total_score: None,
            percentage: None,
            symbolic_grade: None,
            leniency_applied: false,
            graded_at: None,
            graded_by: None,
        }
    }

    pub fn is_graded(&self) -> bool {
        self.total_score.is_some()
    }

    pub fn status_display(&self) -> &'static str {
        status_label(self.is_graded())
    }
}

pub fn status_label(is_graded: bool) -> &'static str {
    if is_graded {
        "Complete"
    } else {
        "Incomplete"
    }
}

/// Weighted total in the scheme's native scale. `None` means "not yet
/// gradable", which is distinct from a legitimate zero.
///
/// Components are summed against whole-percent weights and divided once, so
/// whole-number scores give the exact total and boundary totals such as
/// 75.0 are not rounded into the band below.
pub fn compute_total_score(scheme: &GradingScheme, scores: &RawScoreSet) -> Option<f64> {
    if !scores.is_complete_for(scheme) {
        return None;
    }
    let mut points = 0.0_f64;
    for component in scheme.required_components() {
        points += scores.get(*component)? * scheme.weight_percent(*component)?;
    }
    Some(points / 100.0)
}

/// `total` as a percentage of the scheme's max degree. A single division, so
/// 100-point schemes return the total unchanged.
pub fn percentage_of(total: f64, scheme: &GradingScheme) -> f64 {
    total / (scheme.max_degree() / 100.0)
}

pub fn symbolic_grade_for(percentage: f64) -> SymbolicGrade {
    GRADE_BANDS
        .iter()
        .find(|(threshold, _)| percentage >= *threshold)
        .map(|(_, grade)| *grade)
        .unwrap_or(SymbolicGrade::Fail)
}

/// Grade a near-miss percentage would be promoted to, if it sits in
/// `[threshold - margin, threshold)` for one of the bands.
fn leniency_band(percentage: f64) -> Option<SymbolicGrade> {
    GRADE_BANDS
        .iter()
        .find(|(threshold, _)| {
            percentage >= threshold - LENIENCY_MARGIN && percentage < *threshold
        })
        .map(|(_, grade)| *grade)
}

pub fn leniency_eligible(percentage: f64, a1: Option<f64>, a2: Option<f64>) -> bool {
    let (Some(a1), Some(a2)) = (a1, a2) else {
        return false;
    };
    if a2 <= a1 {
        return false;
    }
    leniency_band(percentage).is_some()
}

pub fn apply_leniency(percentage: f64) -> SymbolicGrade {
    leniency_band(percentage).unwrap_or_else(|| symbolic_grade_for(percentage))
}

pub fn calculate_grade(
    scheme: &GradingScheme,
    scores: &RawScoreSet,
    ctx: &GradingContext,
) -> ComputedGrade {
    let Some(total) = compute_total_score(scheme, scores) else {
        return ComputedGrade::ungraded();
    };
    let percentage = percentage_of(total, scheme);

    let (symbolic_grade, leniency_applied) =
        if leniency_eligible(percentage, scores.assignment1, scores.assignment2) {
            (apply_leniency(percentage), true)
        } else {
            (symbolic_grade_for(percentage), false)
        };

    ComputedGrade {
        total_score: Some(total),
        percentage: Some(percentage),
        symbolic_grade: Some(symbolic_grade),
        leniency_applied,
        graded_at: Some(ctx.graded_at),
        graded_by: ctx.graded_by.clone(),
    }
}

/// Same as [`calculate_grade`], but a course whose scheme could not be
/// resolved is graded exactly like incomplete input.
pub fn calculate_grade_for(
    scheme: Option<&GradingScheme>,
    scores: &RawScoreSet,
    ctx: &GradingContext,
) -> ComputedGrade {
    match scheme {
        Some(s) => calculate_grade(s, scores, ctx),
        None => ComputedGrade::ungraded(),
    }
}
