//! List query descriptors and their translation into backend query parameters.
//!
//! # Design
//! Filtering is soft: each resource has a fixed whitelist mapping filter
//! fields onto backend parameters, and any predicate outside it is dropped
//! without error. The operator is not consulted; the meaning of a field is
//! fixed per resource (`name` on subjects is always a text search).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Translated query parameters, keyed by backend parameter name.
pub type QueryParams = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A sort clause. Carried on the descriptor for callers; the backend takes no
/// sort parameters so none are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }
}

/// Everything needed to request one page of a resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryDescriptor {
    pub resource: String,
    pub pagination: Option<Pagination>,
    pub sorters: Vec<Sorter>,
    pub filters: Vec<FilterPredicate>,
}

impl QueryDescriptor {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    pub fn page(mut self, current_page: u32, page_size: u32) -> Self {
        self.pagination = Some(Pagination {
            current_page,
            page_size,
        });
        self
    }

    pub fn filter(mut self, predicate: FilterPredicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sorters.push(Sorter {
            field: field.into(),
            order,
        });
        self
    }

    pub fn to_params(&self) -> QueryParams {
        translate(&self.resource, self.pagination.as_ref(), &self.filters)
    }
}

struct ResourceFilters {
    resource: &'static str,
    /// (filter field, backend parameter)
    fields: &'static [(&'static str, &'static str)],
    accepts_role: bool,
}

const RESOURCE_FILTERS: &[ResourceFilters] = &[
    ResourceFilters {
        resource: "subjects",
        fields: &[("department", "department"), ("name", "search"), ("code", "search")],
        accepts_role: false,
    },
    ResourceFilters {
        resource: "departments",
        fields: &[("name", "search"), ("code", "search")],
        accepts_role: false,
    },
    ResourceFilters {
        resource: "classes",
        fields: &[("subject", "subject"), ("teacher", "teacher"), ("name", "search")],
        accepts_role: false,
    },
    ResourceFilters {
        resource: "users",
        fields: &[("search", "search"), ("department", "department")],
        accepts_role: true,
    },
    ResourceFilters {
        resource: "enrollments",
        fields: &[("class", "classId"), ("student", "studentId")],
        accepts_role: false,
    },
];

fn param_for(resource: &str, field: &str) -> Option<&'static str> {
    let rules = RESOURCE_FILTERS.iter().find(|r| r.resource == resource)?;
    if field == "role" && rules.accepts_role {
        return Some("role");
    }
    rules
        .fields
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, param)| *param)
}

/// Build the query parameters for a list request.
///
/// `page` and `limit` are always present. Filters outside the resource's
/// whitelist are dropped; when two filters land on the same parameter the
/// later one wins.
pub fn translate(resource: &str, pagination: Option<&Pagination>, filters: &[FilterPredicate]) -> QueryParams {
    let pagination = pagination.copied().unwrap_or_default();
    let mut params = QueryParams::new();
    params.insert("page", pagination.current_page.to_string());
    params.insert("limit", pagination.page_size.to_string());

    for filter in filters {
        match param_for(resource, &filter.field) {
            Some(param) => {
                params.insert(param, stringify(&filter.value));
            }
            None => tracing::trace!(resource, field = %filter.field, "dropping unsupported filter"),
        }
    }
    params
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render parameters as an `application/x-www-form-urlencoded` query string.
pub fn encode(params: &QueryParams) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination_defaults_when_omitted() {
        let params = translate("subjects", None, &[]);
        assert_eq!(params.get("page").map(String::as_str), Some("1"));
        assert_eq!(params.get("limit").map(String::as_str), Some("10"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn classes_subject_and_teacher() {
        let pagination = Pagination {
            current_page: 2,
            page_size: 20,
        };
        let filters = [
            FilterPredicate::eq("subject", "5"),
            FilterPredicate::eq("teacher", "9"),
        ];
        let params = translate("classes", Some(&pagination), &filters);
        let expected: QueryParams = [
            ("page", "2".to_string()),
            ("limit", "20".to_string()),
            ("subject", "5".to_string()),
            ("teacher", "9".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(params, expected);
    }

    #[test]
    fn subjects_name_and_code_collapse_to_search() {
        let params = translate("subjects", None, &[FilterPredicate::contains("code", "CS1")]);
        assert_eq!(params.get("search").map(String::as_str), Some("CS1"));

        let filters = [
            FilterPredicate::contains("name", "Calculus"),
            FilterPredicate::contains("code", "MATH"),
        ];
        let params = translate("subjects", None, &filters);
        assert_eq!(params.get("search").map(String::as_str), Some("MATH"));
    }

    #[test]
    fn subjects_department_passes_through() {
        let params = translate("subjects", None, &[FilterPredicate::eq("department", "CS")]);
        assert_eq!(params.get("department").map(String::as_str), Some("CS"));
    }

    #[test]
    fn non_whitelisted_fields_are_dropped() {
        let filters = [
            FilterPredicate::eq("teacher", "9"),
            FilterPredicate::eq("role", "admin"),
        ];
        let params = translate("subjects", None, &filters);
        assert!(!params.contains_key("teacher"));
        assert!(!params.contains_key("role"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn unknown_resource_keeps_only_pagination() {
        let params = translate("announcements", None, &[FilterPredicate::eq("search", "x")]);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn role_is_honored_for_users() {
        let filters = [
            FilterPredicate::eq("role", "teacher"),
            FilterPredicate::contains("search", "ada"),
        ];
        let params = translate("users", None, &filters);
        assert_eq!(params.get("role").map(String::as_str), Some("teacher"));
        assert_eq!(params.get("search").map(String::as_str), Some("ada"));
    }

    #[test]
    fn values_are_stringified() {
        let filters = [FilterPredicate::eq("subject", json!(5)), FilterPredicate::eq("teacher", json!(true))];
        let params = translate("classes", None, &filters);
        assert_eq!(params["subject"], "5");
        assert_eq!(params["teacher"], "true");
    }

    #[test]
    fn operator_does_not_change_mapping() {
        let filters = [FilterPredicate::new("department", FilterOperator::Ne, "Math")];
        let params = translate("subjects", None, &filters);
        assert_eq!(params["department"], "Math");
    }

    #[test]
    fn descriptor_builder_translates() {
        let descriptor = QueryDescriptor::new("users")
            .page(3, 25)
            .sort("name", SortOrder::Asc)
            .filter(FilterPredicate::eq("role", "student"));
        let params = descriptor.to_params();
        assert_eq!(params["page"], "3");
        assert_eq!(params["limit"], "25");
        assert_eq!(params["role"], "student");
        assert!(!params.contains_key("name"));
    }

    #[test]
    fn encode_escapes_values() {
        let mut params = translate("subjects", None, &[]);
        params.insert("search", "intro & more".to_string());
        assert_eq!(encode(&params), "limit=10&page=1&search=intro+%26+more");
    }

    #[test]
    fn predicate_deserializes_from_wire_names() {
        let predicate: FilterPredicate =
            serde_json::from_str(r#"{"field":"name","operator":"contains","value":"Intro"}"#).unwrap();
        assert_eq!(predicate, FilterPredicate::contains("name", "Intro"));
    }
}
