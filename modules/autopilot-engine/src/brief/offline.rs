use autopilot_common::{
    BriefOrigin, ContentType, DraftBrief, DraftTrigger, LocationProfile, TriggerContext,
};

/// Score for templated FAQ drafts; Q/A structure is what answer engines extract best.
const OFFLINE_FAQ_SCORE: u8 = 55;
const OFFLINE_DEFAULT_SCORE: u8 = 50;

/// Deterministic brief used when no generation credential is configured.
/// Same input always gives the same output.
pub fn offline_brief(
    trigger: &DraftTrigger,
    profile: &LocationProfile,
    content_type: ContentType,
) -> DraftBrief {
    let topic = topic(trigger, profile);
    let title = fallback_title(trigger, profile, content_type);

    let (body, estimated_score) = match content_type {
        ContentType::FaqPage => (faq_body(&topic, profile), OFFLINE_FAQ_SCORE),
        _ => (paragraph_body(&topic, profile, content_type), OFFLINE_DEFAULT_SCORE),
    };

    DraftBrief {
        title,
        body,
        target_keywords: derive_keywords(trigger, profile),
        estimated_score,
        origin: BriefOrigin::Offline,
    }
}

/// What the draft is about, in words that fit inside a sentence.
fn topic(trigger: &DraftTrigger, profile: &LocationProfile) -> String {
    match &trigger.context {
        TriggerContext::Occasion { occasion_name, .. } => occasion_name.clone(),
        TriggerContext::ReviewGap { keyword_gaps, .. } if !keyword_gaps.is_empty() => {
            keyword_gaps.join(" and ")
        }
        TriggerContext::SchemaGap { .. } | TriggerContext::ReviewGap { .. } => format!(
            "{} in {}",
            profile.primary_category().unwrap_or("what we offer"),
            profile.city
        ),
        TriggerContext::Manual {
            title: Some(title),
            target_query: None,
            ..
        } => title.clone(),
        other => other
            .target_query()
            .map(str::to_string)
            .unwrap_or_else(|| format!("visiting {}", profile.business_name)),
    }
}

/// Title used by the offline writer and by degraded generated drafts.
pub(crate) fn fallback_title(
    trigger: &DraftTrigger,
    profile: &LocationProfile,
    content_type: ContentType,
) -> String {
    let business = &profile.business_name;
    let city = &profile.city;
    match &trigger.context {
        TriggerContext::Occasion { occasion_name, .. } => {
            format!("{occasion_name} at {business} in {city}")
        }
        TriggerContext::Manual {
            title: Some(title), ..
        } => title.clone(),
        _ => match content_type {
            ContentType::FaqPage => format!(
                "{business} FAQ: {}",
                title_case(&topic(trigger, profile))
            ),
            ContentType::GbpPost => format!("What guests love about {business}"),
            _ => format!("{} | {business}, {city}", title_case(&topic(trigger, profile))),
        },
    }
}

fn faq_body(topic: &str, profile: &LocationProfile) -> String {
    let business = &profile.business_name;
    let city = &profile.city;
    let place = profile.city_state();
    let category = profile.primary_category().unwrap_or("local business");

    [
        format!("Q: Where can I find {topic} in {city}?"),
        format!("A: {business} is a {category} in {place} known for {topic}."),
        String::new(),
        format!("Q: What makes {business} different from other options in {city}?"),
        format!(
            "A: {business} focuses on the experience guests ask about most, and the team in \
             {city} keeps hours, menu, and booking details current."
        ),
        String::new(),
        format!("Q: How do I visit {business}?"),
        format!(
            "A: {business} welcomes walk-ins and reservations in {place}. Check the website or \
             Google Business Profile for today's hours."
        ),
    ]
    .join("\n")
}

fn paragraph_body(topic: &str, profile: &LocationProfile, content_type: ContentType) -> String {
    let business = &profile.business_name;
    let place = profile.city_state();
    let category = profile.primary_category().unwrap_or("local business");

    format!(
        "{business} is a {category} in {place}. This {} covers {topic}: what guests can expect, \
         why locals choose {business}, and how to plan a visit. Update the details below with \
         current hours, offers, and photos before publishing.",
        content_type.label()
    )
}

/// Keywords for templated and degraded drafts. Never empty.
pub(crate) fn derive_keywords(trigger: &DraftTrigger, profile: &LocationProfile) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut push = |k: String| {
        let k = k.trim().to_lowercase();
        if !k.is_empty() && !keywords.contains(&k) {
            keywords.push(k);
        }
    };

    if let Some(query) = trigger.target_query() {
        push(query.to_string());
    }
    match &trigger.context {
        TriggerContext::Occasion { occasion_name, .. } => {
            push(format!("{occasion_name} {}", profile.city));
        }
        TriggerContext::ReviewGap { keyword_gaps, .. } => {
            keyword_gaps.iter().cloned().for_each(&mut push);
        }
        TriggerContext::SchemaGap {
            missing_schema_types,
            ..
        } => {
            missing_schema_types.iter().cloned().for_each(&mut push);
        }
        _ => {}
    }
    if let Some(category) = profile.primary_category() {
        push(format!("{category} {}", profile.city));
    }
    push(profile.business_name.clone());
    push(format!("{} {}", profile.business_name, profile.city));

    keywords
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{competitor_trigger, profile, review_trigger};
    use uuid::Uuid;

    #[test]
    fn faq_brief_has_literal_question_answer_markers() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "best hookah bar alpharetta");
        let brief = offline_brief(&trigger, &p, ContentType::FaqPage);

        assert!(brief.body.contains("Q:"));
        assert!(brief.body.contains("A:"));
        assert!(brief.body.contains("Charcoal N Chill"));
        assert!(brief.body.contains("Alpharetta"));
        assert!(!brief.target_keywords.is_empty());
        assert!(brief.estimated_score <= 100);
        assert_eq!(brief.origin, BriefOrigin::Offline);
        assert_eq!(brief.title, "Charcoal N Chill FAQ: Best Hookah Bar Alpharetta");
    }

    #[test]
    fn offline_brief_is_deterministic() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "hookah lounge open late");
        assert_eq!(
            offline_brief(&trigger, &p, ContentType::FaqPage),
            offline_brief(&trigger, &p, ContentType::FaqPage)
        );
    }

    #[test]
    fn non_faq_types_get_a_paragraph_naming_business_and_city() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = review_trigger(Uuid::new_v4(), p.location_id);
        let brief = offline_brief(&trigger, &p, ContentType::GbpPost);

        assert!(!brief.body.contains("Q:"));
        assert!(brief.body.contains("Charcoal N Chill"));
        assert!(brief.body.contains("Alpharetta"));
        assert!(brief.target_keywords.iter().any(|k| k == "charcoal n chill"));
    }

    #[test]
    fn keywords_are_deduplicated_and_lowercased() {
        let p = profile("Hookah Bar", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "Hookah Bar");
        let keywords = derive_keywords(&trigger, &p);
        assert_eq!(keywords.iter().filter(|k| *k == "hookah bar").count(), 1);
        assert!(keywords.iter().all(|k| k == &k.to_lowercase()));
    }
}
