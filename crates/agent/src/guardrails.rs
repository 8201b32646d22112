#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForbiddenCategory {
    ReligiousAuthority,
    Medical,
    Legal,
    TechnicalAssistance,
}

impl ForbiddenCategory {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ReligiousAuthority => "religious_authority",
            Self::Medical => "medical",
            Self::Legal => "legal",
            Self::TechnicalAssistance => "technical_assistance",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForbiddenTerm {
    pub term: &'static str,
    pub category: ForbiddenCategory,
}

const fn term(term: &'static str, category: ForbiddenCategory) -> ForbiddenTerm {
    ForbiddenTerm { term, category }
}

pub const FORBIDDEN_TERMS: &[ForbiddenTerm] = &[
    term("مفتی", ForbiddenCategory::ReligiousAuthority),
    term("فتویٰ", ForbiddenCategory::ReligiousAuthority),
    term("حدیث", ForbiddenCategory::ReligiousAuthority),
    term("قرآن", ForbiddenCategory::ReligiousAuthority),
    term("آیت", ForbiddenCategory::ReligiousAuthority),
    term("ڈاکٹر", ForbiddenCategory::Medical),
    term("دوائی", ForbiddenCategory::Medical),
    term("علاج", ForbiddenCategory::Medical),
    term("بیماری", ForbiddenCategory::Medical),
    term("نسخہ", ForbiddenCategory::Medical),
    term("وکیل", ForbiddenCategory::Legal),
    term("قانون", ForbiddenCategory::Legal),
    term("عدالت", ForbiddenCategory::Legal),
    term("جرم", ForbiddenCategory::Legal),
    term("کوڈ", ForbiddenCategory::TechnicalAssistance),
    term("پروگرام", ForbiddenCategory::TechnicalAssistance),
    term("ہیک", ForbiddenCategory::TechnicalAssistance),
    term("پائیتھون", ForbiddenCategory::TechnicalAssistance),
    term("جاوا", ForbiddenCategory::TechnicalAssistance),
];

/// Keyword gate run before any model call.
///
/// Matching is case-sensitive literal substring containment: no tokenizing,
/// stemming or word boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafetyScreen {
    terms: &'static [ForbiddenTerm],
}

impl Default for SafetyScreen {
    fn default() -> Self {
        Self { terms: FORBIDDEN_TERMS }
    }
}

impl SafetyScreen {
    pub fn with_terms(terms: &'static [ForbiddenTerm]) -> Self {
        Self { terms }
    }

    pub fn check(&self, text: &str) -> bool {
        self.first_violation(text).is_none()
    }

    pub fn first_violation(&self, text: &str) -> Option<ForbiddenTerm> {
        self.terms.iter().find(|entry| text.contains(entry.term)).copied()
    }
}

pub fn check_safety_heuristics(text: &str) -> bool {
    SafetyScreen::default().check(text)
}
