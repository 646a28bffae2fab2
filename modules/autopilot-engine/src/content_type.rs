use autopilot_common::{ContentType, TriggerContext};

/// Map a trigger to the kind of page it should become.
pub fn resolve(context: &TriggerContext) -> ContentType {
    match context {
        TriggerContext::CompetitorGap { .. }
        | TriggerContext::PromptMissing { .. }
        | TriggerContext::FirstMover { .. } => ContentType::FaqPage,
        TriggerContext::Occasion { .. } => ContentType::OccasionPage,
        TriggerContext::ReviewGap { .. } => ContentType::GbpPost,
        TriggerContext::SchemaGap { .. } => ContentType::LandingPage,
        TriggerContext::Manual { content_type, .. } => content_type.unwrap_or(ContentType::BlogPost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn query_driven_kinds_become_faq_pages() {
        let competitor = TriggerContext::CompetitorGap {
            target_query: "q".into(),
            competitor_name: "c".into(),
            winning_factor: "w".into(),
        };
        let missing = TriggerContext::PromptMissing {
            target_query: "q".into(),
            category: None,
        };
        let first = TriggerContext::FirstMover {
            target_query: "q".into(),
        };
        for ctx in [competitor, missing, first] {
            assert_eq!(resolve(&ctx), ContentType::FaqPage);
        }
    }

    #[test]
    fn occasion_becomes_occasion_page() {
        let ctx = TriggerContext::Occasion {
            occasion_name: "New Year's Eve".into(),
            peak_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            days_until_peak: 30,
        };
        assert_eq!(resolve(&ctx), ContentType::OccasionPage);
    }

    #[test]
    fn manual_uses_requested_type_or_blog_post() {
        let requested = TriggerContext::Manual {
            title: None,
            target_query: None,
            content_type: Some(ContentType::LandingPage),
        };
        let unspecified = TriggerContext::Manual {
            title: None,
            target_query: None,
            content_type: None,
        };
        assert_eq!(resolve(&requested), ContentType::LandingPage);
        assert_eq!(resolve(&unspecified), ContentType::BlogPost);
    }
}
