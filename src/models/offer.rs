use serde::{Deserialize, Serialize};
use serde_json::Value;

// Offer walls disagree on field names; the first non-empty key wins.
const ID_KEYS: &[&str] = &["id", "offer_id", "offerId"];
const TITLE_KEYS: &[&str] = &["name", "title"];
const STARS_KEYS: &[&str] = &["stars", "value", "payout", "rate"];
const LINK_KEYS: &[&str] = &["url", "link"];
const IMAGE_KEYS: &[&str] = &["image", "icon", "logo", "thumbnail", "img"];
const DESCRIPTION_KEYS: &[&str] = &[
    "description",
    "desc",
    "summary",
    "details",
    "body",
    "text",
    "offer_desc",
    "offerDescription",
    "long_description",
];
const CTA_KEYS: &[&str] = &["cta"];

const DEFAULT_TITLE: &str = "Offer";
const DEFAULT_DESCRIPTION: &str = "Complete this offer to earn stars.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Option<String>,
    pub title: String,
    pub stars: f64,
    pub link: Option<String>,
    pub image: Option<String>,
    pub description: String,
    pub cta: Option<String>,
    pub featured: bool,
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OfferList {
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferQuery {
    pub max: Option<u32>,
    pub user_agent: Option<String>,
}

fn text(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match raw.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match raw.get(*key)? {
        Value::Number(n) => n.as_f64().filter(|v| *v > 0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| *v > 0.0),
        _ => None,
    })
}

impl Offer {
    pub fn normalize(raw: &Value) -> Self {
        let country = text(raw, &["country"]).or_else(|| {
            let list = raw.get("countries")?.as_array()?;
            let joined = list
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        });

        Self {
            id: text(raw, ID_KEYS),
            title: text(raw, TITLE_KEYS).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            stars: number(raw, STARS_KEYS).unwrap_or(1.0),
            link: text(raw, LINK_KEYS),
            image: text(raw, IMAGE_KEYS),
            description: text(raw, DESCRIPTION_KEYS)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            cta: text(raw, CTA_KEYS),
            featured: raw.get("featured").and_then(Value::as_bool).unwrap_or(false),
            country,
        }
    }

    /// Accepts a bare array or an object wrapping it under `offers` or `items`.
    pub fn normalize_feed(payload: &Value) -> Vec<Offer> {
        let list = match payload {
            Value::Array(items) => Some(items),
            Value::Object(map) => map
                .get("offers")
                .or_else(|| map.get("items"))
                .and_then(Value::as_array),
            _ => None,
        };
        list.map(|items| items.iter().filter(|v| v.is_object()).map(Offer::normalize).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_first_present_alias() {
        let offer = Offer::normalize(&json!({
            "offer_id": 991,
            "title": "Install game",
            "value": "12",
            "link": "https://example.com/o/991",
            "icon": "",
            "logo": "https://cdn.example.com/logo.png",
            "summary": "Reach level 5",
            "countries": ["EG", "SA"]
        }));
        assert_eq!(offer.id.as_deref(), Some("991"));
        assert_eq!(offer.title, "Install game");
        assert_eq!(offer.stars, 12.0);
        assert_eq!(offer.image.as_deref(), Some("https://cdn.example.com/logo.png"));
        assert_eq!(offer.description, "Reach level 5");
        assert_eq!(offer.country.as_deref(), Some("EG, SA"));
        assert!(!offer.featured);
    }

    #[test]
    fn missing_fields_fall_back() {
        let offer = Offer::normalize(&json!({}));
        assert_eq!(offer.title, DEFAULT_TITLE);
        assert_eq!(offer.stars, 1.0);
        assert_eq!(offer.description, DEFAULT_DESCRIPTION);
        assert!(offer.link.is_none());
    }

    #[test]
    fn feed_shapes() {
        let one = json!({"name": "A"});
        assert_eq!(Offer::normalize_feed(&json!([one.clone()])).len(), 1);
        assert_eq!(Offer::normalize_feed(&json!({"offers": [one.clone(), 3]})).len(), 1);
        assert_eq!(Offer::normalize_feed(&json!({"items": [one]})).len(), 1);
        assert!(Offer::normalize_feed(&json!("nope")).is_empty());
    }
}
