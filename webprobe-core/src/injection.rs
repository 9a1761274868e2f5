use crate::detect::access::classify;
use serde::{Deserialize, Serialize};
use webprobe_scanner::{FormDescriptor, Method, ProbeRequest, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointSource {
    UrlParam,
    FormField,
}

/// How the fields a check does not target are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    /// Only the targeted field changes.
    #[default]
    Single,
    /// Every free-text field of a form carries the payload.
    FreeText,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointOwner {
    Resource(Resource),
    Form(FormDescriptor),
}

/// A named value that can be swapped for a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionPoint {
    pub source: PointSource,
    pub name: String,
    pub original: String,
    pub field_type: String,
    pub owner: PointOwner,
    pub fill: FillPolicy,
}

impl InjectionPoint {
    /// Resource for URL parameters, form action for form fields.
    pub fn target(&self) -> &Resource {
        match &self.owner {
            PointOwner::Resource(url) => url,
            PointOwner::Form(form) => &form.action,
        }
    }

    pub fn form(&self) -> Option<&FormDescriptor> {
        match &self.owner {
            PointOwner::Form(form) => Some(form),
            PointOwner::Resource(_) => None,
        }
    }

    pub fn is_free_text(&self) -> bool {
        match &self.owner {
            PointOwner::Resource(_) => true,
            PointOwner::Form(form) => form.field(&self.name).is_some_and(|f| f.is_free_text()),
        }
    }

    /// Request with this point's value replaced by `value`.
    pub fn mutate(&self, value: &str) -> ProbeRequest {
        match &self.owner {
            PointOwner::Resource(url) => {
                let mut replaced = false;
                let pairs: Vec<(String, String)> = url
                    .query_pairs()
                    .into_iter()
                    .map(|(name, original)| {
                        if !replaced && name == self.name {
                            replaced = true;
                            (name, value.to_string())
                        } else {
                            (name, original)
                        }
                    })
                    .collect();
                ProbeRequest::get(url.with_query(&pairs))
            }
            PointOwner::Form(form) => {
                let fields = form
                    .fields
                    .iter()
                    .map(|field| {
                        let targeted = field.name == self.name
                            || (self.fill == FillPolicy::FreeText && field.is_free_text());
                        let v = if targeted { value } else { field.value.as_str() };
                        (field.name.clone(), v.to_string())
                    })
                    .collect();
                form_request(form, fields)
            }
        }
    }

    /// The untouched request.
    pub fn baseline(&self) -> ProbeRequest {
        match &self.owner {
            PointOwner::Resource(url) => ProbeRequest::get(url.clone()),
            PointOwner::Form(form) => form_request(form, form.default_values()),
        }
    }
}

/// Submit `fields` the way the form would: into the action's query for GET,
/// urlencoded body for POST.
pub fn form_request(form: &FormDescriptor, fields: Vec<(String, String)>) -> ProbeRequest {
    match form.method {
        Method::Get => ProbeRequest::get(form.action.with_query(&fields)),
        Method::Post => ProbeRequest::post(form.action.clone(), fields),
    }
}

/// One point per distinct query parameter, holding its first value.
pub fn points_for_resource(url: &Resource) -> Vec<InjectionPoint> {
    let mut points: Vec<InjectionPoint> = Vec::new();
    for (name, value) in url.query_pairs() {
        if points.iter().any(|p| p.name == name) {
            continue;
        }
        points.push(InjectionPoint {
            source: PointSource::UrlParam,
            name,
            original: value,
            field_type: "query".to_string(),
            owner: PointOwner::Resource(url.clone()),
            fill: FillPolicy::Single,
        });
    }
    points
}

/// One point per form field. Under [`FillPolicy::FreeText`] the free-text
/// fields collapse into one representative point.
pub fn points_for_form(form: &FormDescriptor, fill: FillPolicy) -> Vec<InjectionPoint> {
    let mut points = Vec::new();
    let mut free_text_seen = false;
    for field in &form.fields {
        if fill == FillPolicy::FreeText && field.is_free_text() {
            if free_text_seen {
                continue;
            }
            free_text_seen = true;
        }
        points.push(InjectionPoint {
            source: PointSource::FormField,
            name: field.name.clone(),
            original: field.value.clone(),
            field_type: field.field_type.clone(),
            owner: PointOwner::Form(form.clone()),
            fill,
        });
    }
    points
}

/// Restricts which points a check probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Every URL parameter and every free-text form field.
    Injectable,
    /// Names in the list, compared case-insensitively.
    Names(&'static [&'static str]),
    /// Values that look like a sequential number or a UUID.
    IdShaped,
    /// File inputs.
    File,
}

impl Selector {
    pub fn matches(&self, point: &InjectionPoint) -> bool {
        match self {
            Selector::Injectable => point.is_free_text(),
            Selector::Names(names) => {
                let lower = point.name.to_ascii_lowercase();
                names.contains(&lower.as_str())
            }
            Selector::IdShaped => classify(&point.original).is_some(),
            Selector::File => point.field_type == "file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webprobe_scanner::{FieldDescriptor, RequestBody};

    fn login_form(method: Method) -> FormDescriptor {
        FormDescriptor::new(
            method,
            Resource::parse("http://example.com/login?lang=en").unwrap(),
        )
        .with_field(FieldDescriptor::new("user", "text", "bob"))
        .with_field(FieldDescriptor::new("pass", "password", ""))
        .with_field(FieldDescriptor::new("csrf", "hidden", "t0k"))
    }

    #[test]
    fn test_url_points_follow_query_order() {
        let url = Resource::parse("http://example.com/s?q=shoes&page=2&q=boots").unwrap();
        let points = points_for_resource(&url);
        let names: Vec<_> = points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["q", "page"]);
        assert_eq!(points[0].original, "shoes");
        assert_eq!(points[0].source, PointSource::UrlParam);
    }

    #[test]
    fn test_url_mutation_replaces_one_parameter() {
        let url = Resource::parse("http://example.com/s?q=shoes&page=2").unwrap();
        let points = points_for_resource(&url);
        let request = points[1].mutate("'");
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.url.query_pairs(),
            vec![
                ("q".to_string(), "shoes".to_string()),
                ("page".to_string(), "'".to_string())
            ]
        );
    }

    #[test]
    fn test_post_single_fill_keeps_other_values() {
        let form = login_form(Method::Post);
        let points = points_for_form(&form, FillPolicy::Single);
        assert_eq!(points.len(), 3);
        let request = points[1].mutate("x");
        assert_eq!(request.url.as_str(), "http://example.com/login?lang=en");
        assert_eq!(
            request.body,
            RequestBody::Form {
                fields: vec![
                    ("user".to_string(), "bob".to_string()),
                    ("pass".to_string(), "x".to_string()),
                    ("csrf".to_string(), "t0k".to_string()),
                ]
            }
        );
    }

    #[test]
    fn test_free_text_fill_collapses_points() {
        let form = login_form(Method::Post);
        let points = points_for_form(&form, FillPolicy::FreeText);
        let names: Vec<_> = points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["user", "csrf"]);

        let request = points[0].mutate("<b>");
        assert_eq!(
            request.fields(),
            vec![
                ("user".to_string(), "<b>".to_string()),
                ("pass".to_string(), "<b>".to_string()),
                ("csrf".to_string(), "t0k".to_string()),
            ]
        );
    }

    #[test]
    fn test_get_form_fields_replace_action_query() {
        let form = login_form(Method::Get);
        let points = points_for_form(&form, FillPolicy::Single);
        let request = points[0].mutate("alice");
        assert_eq!(request.body, RequestBody::None);
        assert_eq!(
            request.url.as_str(),
            "http://example.com/login?user=alice&pass=&csrf=t0k"
        );
    }

    #[test]
    fn test_selectors() {
        let form = login_form(Method::Post)
            .with_field(FieldDescriptor::new("account_id", "hidden", "42"))
            .with_field(FieldDescriptor::new("avatar", "file", ""))
            .with_field(FieldDescriptor::new("Next", "hidden", "/home"));
        let points = points_for_form(&form, FillPolicy::Single);
        let pick = |s: Selector| -> Vec<String> {
            points
                .iter()
                .filter(|p| s.matches(p))
                .map(|p| p.name.clone())
                .collect()
        };
        assert_eq!(pick(Selector::Injectable), vec!["user", "pass"]);
        assert_eq!(pick(Selector::IdShaped), vec!["account_id"]);
        assert_eq!(pick(Selector::File), vec!["avatar"]);
        assert_eq!(pick(Selector::Names(&["next", "url"])), vec!["Next"]);
    }
}
