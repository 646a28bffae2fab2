use autopilot_common::{DraftTrigger, LocationProfile, TriggerContext};

/// Narrative block explaining why this draft exists, so the generation prompt
/// always carries the causal signal.
pub fn context_block(trigger: &DraftTrigger, profile: &LocationProfile) -> String {
    let business = &profile.business_name;
    let place = profile.city_state();

    match &trigger.context {
        TriggerContext::CompetitorGap {
            target_query,
            competitor_name,
            winning_factor,
        } => format!(
            "Competitor Gap Alert: {business} in {place} lost to {competitor_name} because \
             {winning_factor}. Target query: \"{target_query}\". Write content that answers this \
             query directly and gives an answer engine a concrete reason to recommend {business}."
        ),
        TriggerContext::Occasion {
            occasion_name,
            peak_date,
            days_until_peak,
        } => format!(
            "Seasonal Opportunity: {occasion_name} peaks on {} ({days_until_peak} days away) and \
             {business} in {place} is not cited for it by any answer engine. Write content \
             positioning {business} as a destination for {occasion_name}.",
            peak_date.format("%B %-d, %Y")
        ),
        TriggerContext::PromptMissing {
            target_query,
            category,
        } => {
            let category = category
                .as_deref()
                .or(profile.primary_category())
                .unwrap_or("local business");
            format!(
                "Missing Citation: when customers ask \"{target_query}\", answer engines do not \
                 mention {business}, a {category} in {place}. Write content that makes {business} \
                 the obvious answer to this question."
            )
        }
        TriggerContext::FirstMover { target_query } => format!(
            "First Mover Opportunity: no business in {place} is cited yet for \"{target_query}\". \
             {business} can own this query by publishing the first clear, specific answer."
        ),
        TriggerContext::ReviewGap {
            review_count,
            average_rating,
            keyword_gaps,
        } => {
            let rating = average_rating
                .map(|r| format!(" averaging {r:.1} stars"))
                .unwrap_or_default();
            let gaps = if keyword_gaps.is_empty() {
                "the experiences customers search for".to_string()
            } else {
                keyword_gaps.join(", ")
            };
            format!(
                "Review Gap: {business} in {place} has {review_count} reviews{rating}, but they \
                 rarely mention {gaps}. Write a short Google Business Profile post that \
                 highlights these topics and invites customers to share them."
            )
        }
        TriggerContext::SchemaGap {
            missing_schema_types,
            page_url,
        } => {
            let page = page_url
                .as_deref()
                .map(|u| format!(" on {u}"))
                .unwrap_or_default();
            format!(
                "Structured Data Gap: {business} in {place} is missing {} markup{page}. Write \
                 landing page copy whose sections map cleanly onto these schema types so answer \
                 engines can extract facts about {business}.",
                missing_schema_types.join(", ")
            )
        }
        TriggerContext::Manual {
            title,
            target_query,
            ..
        } => {
            let topic = target_query
                .as_deref()
                .or(title.as_deref())
                .unwrap_or("what makes the business worth visiting");
            format!(
                "Manual Request: the owner of {business} in {place} asked for content about \
                 \"{topic}\"."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::profile;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn trigger(context: TriggerContext) -> DraftTrigger {
        DraftTrigger::new(Uuid::new_v4(), Uuid::new_v4(), context)
    }

    #[test]
    fn competitor_block_names_competitor_reason_and_query() {
        let block = context_block(
            &trigger(TriggerContext::CompetitorGap {
                target_query: "best hookah bar alpharetta".into(),
                competitor_name: "Cloud Nine Lounge".into(),
                winning_factor: "it lists its late-night hours".into(),
            }),
            &profile("Charcoal N Chill", "Alpharetta", "GA"),
        );
        assert!(block.starts_with("Competitor Gap Alert"));
        assert!(block.contains("Cloud Nine Lounge"));
        assert!(block.contains("it lists its late-night hours"));
        assert!(block.contains("\"best hookah bar alpharetta\""));
        assert!(block.contains("Alpharetta, GA"));
    }

    #[test]
    fn occasion_block_formats_peak_date() {
        let block = context_block(
            &trigger(TriggerContext::Occasion {
                occasion_name: "Valentine's Day".into(),
                peak_date: NaiveDate::from_ymd_opt(2027, 2, 14).unwrap(),
                days_until_peak: 12,
            }),
            &profile("Charcoal N Chill", "Alpharetta", "GA"),
        );
        assert!(block.contains("February 14, 2027"));
        assert!(block.contains("12 days away"));
    }

    #[test]
    fn prompt_missing_falls_back_to_profile_category() {
        let block = context_block(
            &trigger(TriggerContext::PromptMissing {
                target_query: "hookah with food".into(),
                category: None,
            }),
            &profile("Charcoal N Chill", "Alpharetta", "GA"),
        );
        assert!(block.contains("a hookah lounge in Alpharetta, GA"));
    }

    #[test]
    fn every_block_names_the_business() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let contexts = vec![
            TriggerContext::FirstMover {
                target_query: "q".into(),
            },
            TriggerContext::ReviewGap {
                review_count: 41,
                average_rating: Some(4.64),
                keyword_gaps: vec!["live music".into()],
            },
            TriggerContext::SchemaGap {
                missing_schema_types: vec!["FAQPage".into(), "Menu".into()],
                page_url: None,
            },
            TriggerContext::Manual {
                title: Some("Our story".into()),
                target_query: None,
                content_type: None,
            },
        ];
        for ctx in contexts {
            let block = context_block(&trigger(ctx), &p);
            assert!(block.contains("Charcoal N Chill"), "missing business in: {block}");
        }
    }
}
