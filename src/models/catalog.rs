//! Website content: services, pricing packages and portfolio entries.
//!
//! All three are flat records with a visibility flag and a display order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{de, Entity, Ordered};
use crate::validation::{validate_optional_url, FieldErrors};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub title: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default, deserialize_with = "de::string")]
    pub icon: String,
    /// Display price ("from $900")
    #[serde(default, deserialize_with = "de::string")]
    pub price: String,
    #[serde(default, deserialize_with = "de::string_list")]
    pub features: Vec<String>,
    #[serde(default = "de::default_true", deserialize_with = "de::flag_default_true")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "de::integer")]
    pub order: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            icon: String::new(),
            price: String::new(),
            features: Vec::new(),
            is_active: true,
            order: 0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPackage {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub name: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default, deserialize_with = "de::number")]
    pub price: f64,
    /// Billing period label ("month", "project")
    #[serde(default, deserialize_with = "de::string")]
    pub period: String,
    #[serde(default, deserialize_with = "de::string_list")]
    pub features: Vec<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_popular: bool,
    #[serde(default = "de::default_true", deserialize_with = "de::flag_default_true")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "de::integer")]
    pub order: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PricingPackage {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            price: 0.0,
            period: String::new(),
            features: Vec::new(),
            is_popular: false,
            is_active: true,
            order: 0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioProject {
    #[serde(default, deserialize_with = "de::string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string")]
    pub title: String,
    #[serde(default, deserialize_with = "de::string")]
    pub description: String,
    #[serde(default, deserialize_with = "de::string")]
    pub category: String,
    #[serde(default, deserialize_with = "de::string")]
    pub client: String,
    /// Stored path returned by the image upload endpoint
    #[serde(default, deserialize_with = "de::string")]
    pub image_url: String,
    #[serde(default, deserialize_with = "de::string")]
    pub live_url: String,
    #[serde(default, deserialize_with = "de::string")]
    pub github_url: String,
    #[serde(default, deserialize_with = "de::string")]
    pub completion_date: String,
    #[serde(default, deserialize_with = "de::string_list")]
    pub technologies: Vec<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub featured: bool,
    #[serde(default = "de::default_true", deserialize_with = "de::flag_default_true")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "de::integer")]
    pub order: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PortfolioProject {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            category: String::new(),
            client: String::new(),
            image_url: String::new(),
            live_url: String::new(),
            github_url: String::new(),
            completion_date: String::new(),
            technologies: Vec::new(),
            featured: false,
            is_active: true,
            order: 0,
            extra: Map::new(),
        }
    }
}

impl Entity for Service {
    const KIND: &'static str = "Service";
    const COLLECTION: &'static str = "services";
    const REQUIRED_FIELDS: &'static [&'static str] = &["title", "description"];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Entity for PricingPackage {
    const KIND: &'static str = "Pricing package";
    const COLLECTION: &'static str = "pricingPackages";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "description"];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn check(&self, errors: &mut FieldErrors) {
        if self.price < 0.0 {
            errors.add("price", "Price cannot be negative");
        }
    }
}

impl Entity for PortfolioProject {
    const KIND: &'static str = "Portfolio project";
    const COLLECTION: &'static str = "allProjects";
    const REQUIRED_FIELDS: &'static [&'static str] = &["title", "description", "category"];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn check(&self, errors: &mut FieldErrors) {
        if let Err(e) = validate_optional_url(&self.live_url) {
            errors.add("liveUrl", e);
        }
        if let Err(e) = validate_optional_url(&self.github_url) {
            errors.add("githubUrl", e);
        }
    }
}

impl Ordered for Service {
    fn order(&self) -> i64 {
        self.order
    }
    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

impl Ordered for PricingPackage {
    fn order(&self) -> i64 {
        self.order
    }
    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

impl Ordered for PortfolioProject {
    fn order(&self) -> i64 {
        self.order
    }
    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_defaults_to_active() {
        let s: Service = serde_json::from_value(json!({"id": "s1", "title": "SEO"})).unwrap();
        assert!(s.is_active);
        assert!(s.features.is_empty());
        assert_eq!(s.order, 0);
        assert!(Service::default().is_active);
    }

    #[test]
    fn test_package_price_from_string() {
        let p: PricingPackage =
            serde_json::from_value(json!({"name": "Starter", "price": "$1,200", "order": "2"}))
                .unwrap();
        assert_eq!(p.price, 1200.0);
        assert_eq!(p.order, 2);
        assert!(!p.is_popular);
    }

    #[test]
    fn test_portfolio_urls_checked() {
        let p = PortfolioProject {
            live_url: "not a url".to_string(),
            ..Default::default()
        };
        let mut errors = FieldErrors::new();
        p.check(&mut errors);
        assert!(errors.get("liveUrl").is_some());
        assert!(errors.get("githubUrl").is_none());
    }
}
