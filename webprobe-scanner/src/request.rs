use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// HTML form semantics: only `post` selects POST, anything else is GET.
    pub fn from_form_attr(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("post") => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory file sent through a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub field: String,
    pub filename: String,
    #[serde(skip)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum RequestBody {
    None,
    Form { fields: Vec<(String, String)> },
    Multipart {
        fields: Vec<(String, String)>,
        file: UploadFile,
    },
}

/// Everything needed to replay one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: Resource,
    pub body: RequestBody,
}

impl ProbeRequest {
    pub fn get(url: Resource) -> Self {
        Self {
            method: Method::Get,
            url,
            body: RequestBody::None,
        }
    }

    pub fn post(url: Resource, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url,
            body: RequestBody::Form { fields },
        }
    }

    pub fn multipart(url: Resource, fields: Vec<(String, String)>, file: UploadFile) -> Self {
        Self {
            method: Method::Post,
            url,
            body: RequestBody::Multipart { fields, file },
        }
    }

    /// Submitted name/value pairs, from the query for GET and the body for POST.
    pub fn fields(&self) -> Vec<(String, String)> {
        match &self.body {
            RequestBody::None => self.url.query_pairs(),
            RequestBody::Form { fields } | RequestBody::Multipart { fields, .. } => fields.clone(),
        }
    }
}
