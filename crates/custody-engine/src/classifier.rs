//! Custody relevance classification for imported calendar events.
//!
//! Keyword heuristics over the event title and description. Matching is
//! case-insensitive and on whole words: punctuation is treated as a word
//! break, so "Pick-up" matches "pick up" but "recall" does not match "call".

use serde::Serialize;

use crate::model::{NormalizedCalendarEvent, VisitType};

const CUSTODY_KEYWORDS: &[&str] = &[
    "custody",
    "visitation",
    "parenting",
    "parenting time",
    "coparent",
    "co parent",
    "coparenting",
    "co parenting",
    "visit",
    "visits",
    "pickup",
    "pickups",
    "pick up",
    "pick ups",
    "dropoff",
    "dropoffs",
    "drop off",
    "drop offs",
    "exchange",
    "exchanges",
    "handoff",
    "handoffs",
    "hand off",
    "hand offs",
    "overnight",
    "overnights",
    "sleepover",
    "sleepovers",
    "school",
    "kid",
    "kids",
    "child",
    "children",
    "son",
    "daughter",
];

const OVERNIGHT_KEYWORDS: &[&str] = &[
    "overnight",
    "overnights",
    "sleepover",
    "sleepovers",
    "sleep over",
    "stay over",
    "stayover",
];

const VIRTUAL_KEYWORDS: &[&str] = &[
    "call",
    "video",
    "video call",
    "facetime",
    "zoom",
    "phone",
    "skype",
    "virtual",
    "teams call",
];

const TRANSPORT_KEYWORDS: &[&str] = &[
    "pickup",
    "pickups",
    "pick up",
    "pick ups",
    "dropoff",
    "dropoffs",
    "drop off",
    "drop offs",
    "school run",
    "school drop",
    "carpool",
    "bus stop",
];

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub is_custody_related: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_visit_type: Option<VisitType>,
}

/// Decide whether an event is custody-related and suggest a visit type.
///
/// Suggestion order: overnight language, then call/video language, then
/// pickup/drop-off language for events that stay within one day, else
/// [`VisitType::PhysicalCare`].
///
/// # Examples
///
/// ```
/// use custody_engine::classifier::classify;
/// use custody_engine::model::{EventTime, NormalizedCalendarEvent, VisitType};
///
/// let event = NormalizedCalendarEvent::new(
///     "Pickup at school",
///     EventTime::parse_ics("20250310T150000").unwrap(),
/// );
/// let result = classify(&event);
/// assert!(result.is_custody_related);
/// assert_eq!(result.suggested_visit_type, Some(VisitType::SchoolTransportOnly));
/// ```
pub fn classify(event: &NormalizedCalendarEvent) -> Classification {
    let text = normalize(&format!(
        "{} {}",
        event.title,
        event.description.as_deref().unwrap_or_default()
    ));

    if !contains_any(&text, CUSTODY_KEYWORDS) {
        return Classification {
            is_custody_related: false,
            suggested_visit_type: None,
        };
    }

    let visit_type = if contains_any(&text, OVERNIGHT_KEYWORDS) {
        VisitType::Overnight
    } else if contains_any(&text, VIRTUAL_KEYWORDS) {
        VisitType::VirtualCall
    } else if contains_any(&text, TRANSPORT_KEYWORDS) && !event.spans_midnight() {
        VisitType::SchoolTransportOnly
    } else {
        VisitType::PhysicalCare
    };

    Classification {
        is_custody_related: true,
        suggested_visit_type: Some(visit_type),
    }
}

/// Lowercase, turn every non-alphanumeric run into one space, and pad both
/// ends so phrases can be matched as `" phrase "`.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    format!(" {} ", words.join(" "))
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords
        .iter()
        .any(|keyword| haystack.contains(&format!(" {keyword} ")))
}
