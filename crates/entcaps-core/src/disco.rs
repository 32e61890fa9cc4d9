//! Service discovery (disco#info) reply types.

use serde::{Deserialize, Serialize};

use crate::features::FeatureSet;

/// Form type of the software information extension (XEP-0232).
pub const SOFTWARE_INFO_FORM_TYPE: &str = "urn:xmpp:dataforms:softwareinfo";

/// Name of the hidden field carrying a form's type.
pub const FORM_TYPE_FIELD: &str = "FORM_TYPE";

/// A discovered identity (`<identity category type xml:lang name/>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Identity category (e.g. `client`).
    pub category: String,
    /// Identity type (e.g. `pc`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Language of the name, if any.
    #[serde(default)]
    pub lang: Option<String>,
    /// Human-readable name, if any.
    #[serde(default)]
    pub name: Option<String>,
}

impl Identity {
    /// Create an identity with no language and no name.
    #[must_use]
    pub fn new(category: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            kind: kind.into(),
            lang: None,
            name: None,
        }
    }

    /// Set the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the language.
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Sort key used for canonical ordering.
    pub(crate) fn sort_key(&self) -> (&str, &str, &str, &str) {
        (
            &self.category,
            &self.kind,
            self.lang.as_deref().unwrap_or_default(),
            self.name.as_deref().unwrap_or_default(),
        )
    }
}

/// One field of an extended-info data form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Field name.
    pub var: String,
    /// Field values, in received order.
    #[serde(default)]
    pub values: Vec<String>,
}

impl FormField {
    /// Create a field with the given values.
    #[must_use]
    pub fn new(var: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            var: var.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// An extended-info data form (`jabber:x:data`, type `result`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataForm {
    /// Fields, including the hidden `FORM_TYPE` field.
    #[serde(default)]
    pub fields: Vec<FormField>,
}

impl DataForm {
    /// Create a form with the given `FORM_TYPE`.
    #[must_use]
    pub fn new(form_type: impl Into<String>) -> Self {
        Self {
            fields: vec![FormField::new(FORM_TYPE_FIELD, [form_type.into()])],
        }
    }

    /// Add a single-valued field.
    #[must_use]
    pub fn with_field(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField::new(var, [value.into()]));
        self
    }

    /// The form's `FORM_TYPE`, if the form declares exactly one.
    #[must_use]
    pub fn form_type(&self) -> Option<&str> {
        let mut found = self.fields.iter().filter(|f| f.var == FORM_TYPE_FIELD);
        let field = found.next()?;
        if found.next().is_some() {
            return None;
        }
        match field.values.as_slice() {
            [value] => Some(value.as_str()),
            _ => None,
        }
    }

    /// First value of a field.
    #[must_use]
    pub fn value(&self, var: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.var == var)
            .and_then(|f| f.values.first())
            .map(String::as_str)
    }
}

/// Informational software attributes carried by a disco reply.
///
/// Never used for trust decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareInfo {
    /// Client software name.
    pub software: Option<String>,
    /// Client software version.
    pub software_version: Option<String>,
    /// Operating system.
    pub os: Option<String>,
    /// Operating system version.
    pub os_version: Option<String>,
}

impl SoftwareInfo {
    /// Extract software information from a `urn:xmpp:dataforms:softwareinfo` form.
    #[must_use]
    pub fn from_form(form: &DataForm) -> Option<Self> {
        if form.form_type() != Some(SOFTWARE_INFO_FORM_TYPE) {
            return None;
        }
        let owned = |var: &str| form.value(var).map(ToString::to_string);
        Some(Self {
            software: owned("software"),
            software_version: owned("software_version"),
            os: owned("os"),
            os_version: owned("os_version"),
        })
    }
}

/// A successful disco#info reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoInfo {
    /// Node echoed by the responder, if any.
    #[serde(default)]
    pub node: Option<String>,
    /// Identities, in received order.
    #[serde(default)]
    pub identities: Vec<Identity>,
    /// Feature URIs, in received order (duplicates preserved).
    #[serde(default)]
    pub features: Vec<String>,
    /// Extended info forms.
    #[serde(default)]
    pub forms: Vec<DataForm>,
}

impl DiscoInfo {
    /// Create an empty reply.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the echoed node.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Add an identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    /// Add a feature.
    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    /// Add several features.
    #[must_use]
    pub fn with_features(mut self, features: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    /// Add an extended info form.
    #[must_use]
    pub fn with_form(mut self, form: DataForm) -> Self {
        self.forms.push(form);
        self
    }

    /// The reply's features as a deduplicated set.
    #[must_use]
    pub fn feature_set(&self) -> FeatureSet {
        self.features.iter().cloned().collect()
    }

    /// Software information, if the reply carries a software info form.
    #[must_use]
    pub fn software_info(&self) -> Option<SoftwareInfo> {
        self.forms.iter().find_map(SoftwareInfo::from_form)
    }
}
