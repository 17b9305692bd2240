//! Metadata field tables and the compact request token codec.
//!
//! A token lists requested fields per category: the category letter
//! (`i`, `p`, `c`) followed by the single-digit codes of its fields in
//! ascending order, e.g. `i14c1` = identity name + age, contact email.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::status::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("unknown metadata category '{0}'")]
    UnknownCategory(String),

    #[error("unknown metadata field '{field}' in category {category}")]
    UnknownField { category: String, field: String },

    #[error("unknown metadata category letter '{0}'")]
    UnknownCategoryLetter(char),

    #[error("metadata code '{0}' appears before any category letter")]
    OrphanCode(char),

    #[error("metadata category '{0}' is repeated or out of order")]
    CategoryOrder(char),
}

impl MetadataError {
    pub fn status(&self) -> StatusCode {
        StatusCode::ResponseMalformedMetadata
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;

// ---------------------------------------------------------------------------
// MetadataCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataCategory {
    Identity,
    Position,
    Contact,
}

impl MetadataCategory {
    /// Categories in token order.
    pub const ALL: [MetadataCategory; 3] = [
        MetadataCategory::Identity,
        MetadataCategory::Position,
        MetadataCategory::Contact,
    ];

    pub fn letter(self) -> char {
        match self {
            MetadataCategory::Identity => 'i',
            MetadataCategory::Position => 'p',
            MetadataCategory::Contact => 'c',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MetadataCategory::Identity => "identity",
            MetadataCategory::Position => "position",
            MetadataCategory::Contact => "contact",
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.letter() == letter)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn fields(self) -> impl Iterator<Item = MetadataField> {
        MetadataField::ALL
            .iter()
            .copied()
            .filter(move |f| f.category() == self)
    }
}

impl fmt::Display for MetadataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// MetadataField
// ---------------------------------------------------------------------------

/// A personal-data attribute a service may request.
///
/// Variants are declared in (category, code) order so the derived `Ord`
/// is the canonical token order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataField {
    Name,
    Family,
    Nickname,
    Age,
    Gender,
    Birthdate,
    Picture,
    National,
    Country,
    State,
    City,
    Streetname,
    Streetnumber,
    Residence,
    Coordinates,
    Email,
    Instant,
    Social,
    Phone,
    Postal,
}

impl MetadataField {
    pub const ALL: [MetadataField; 20] = [
        MetadataField::Name,
        MetadataField::Family,
        MetadataField::Nickname,
        MetadataField::Age,
        MetadataField::Gender,
        MetadataField::Birthdate,
        MetadataField::Picture,
        MetadataField::National,
        MetadataField::Country,
        MetadataField::State,
        MetadataField::City,
        MetadataField::Streetname,
        MetadataField::Streetnumber,
        MetadataField::Residence,
        MetadataField::Coordinates,
        MetadataField::Email,
        MetadataField::Instant,
        MetadataField::Social,
        MetadataField::Phone,
        MetadataField::Postal,
    ];

    pub fn category(self) -> MetadataCategory {
        use MetadataField::*;
        match self {
            Name | Family | Nickname | Age | Gender | Birthdate | Picture | National => {
                MetadataCategory::Identity
            }
            Country | State | City | Streetname | Streetnumber | Residence | Coordinates => {
                MetadataCategory::Position
            }
            Email | Instant | Social | Phone | Postal => MetadataCategory::Contact,
        }
    }

    /// Single-digit code within the field's category.
    pub fn code(self) -> u8 {
        use MetadataField::*;
        match self {
            Name => 1,
            Family => 2,
            Nickname => 3,
            Age => 4,
            Gender => 5,
            Birthdate => 6,
            Picture => 8,
            National => 9,
            Country => 1,
            State => 2,
            City => 3,
            Streetname => 4,
            Streetnumber => 5,
            Residence => 6,
            Coordinates => 9,
            Email => 1,
            Instant => 2,
            Social => 3,
            Phone => 4,
            Postal => 5,
        }
    }

    pub fn name(self) -> &'static str {
        use MetadataField::*;
        match self {
            Name => "name",
            Family => "family",
            Nickname => "nickname",
            Age => "age",
            Gender => "gender",
            Birthdate => "birthdate",
            Picture => "picture",
            National => "national",
            Country => "country",
            State => "state",
            City => "city",
            Streetname => "streetname",
            Streetnumber => "streetnumber",
            Residence => "residence",
            Coordinates => "coordinates",
            Email => "email",
            Instant => "instant",
            Social => "social",
            Phone => "phone",
            Postal => "postal",
        }
    }

    /// Field names are unique across categories, so a bare name suffices.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn from_code(category: MetadataCategory, code: u8) -> Option<Self> {
        category.fields().find(|f| f.code() == code)
    }

    /// Resolve a field name that must belong to `category`.
    pub fn in_category(category: MetadataCategory, name: &str) -> MetadataResult<Self> {
        Self::from_name(name)
            .filter(|f| f.category() == category)
            .ok_or_else(|| MetadataError::UnknownField {
                category: category.name().to_string(),
                field: name.to_string(),
            })
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// FieldSet
// ---------------------------------------------------------------------------

/// Ordered set of requested metadata fields.
///
/// Serializes as `{ "identity": ["name", "age"], ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<MetadataCategory, Vec<MetadataField>>",
    try_from = "BTreeMap<MetadataCategory, Vec<MetadataField>>"
)]
pub struct FieldSet(BTreeSet<MetadataField>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw category and field names, rejecting anything
    /// outside the fixed tables.
    pub fn from_names<C, F, S>(categories: C) -> MetadataResult<Self>
    where
        C: IntoIterator<Item = (S, F)>,
        F: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = FieldSet::new();
        for (category_name, fields) in categories {
            let category = MetadataCategory::from_name(category_name.as_ref())
                .ok_or_else(|| MetadataError::UnknownCategory(category_name.as_ref().to_string()))?;
            for field in fields {
                set.insert(MetadataField::in_category(category, field.as_ref())?);
            }
        }
        Ok(set)
    }

    pub fn insert(&mut self, field: MetadataField) -> bool {
        self.0.insert(field)
    }

    pub fn contains(&self, field: MetadataField) -> bool {
        self.0.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = MetadataField> + '_ {
        self.0.iter().copied()
    }

    pub fn in_category(&self, category: MetadataCategory) -> impl Iterator<Item = MetadataField> + '_ {
        self.iter().filter(move |f| f.category() == category)
    }

    pub fn by_category(&self) -> BTreeMap<MetadataCategory, Vec<MetadataField>> {
        let mut map: BTreeMap<MetadataCategory, Vec<MetadataField>> = BTreeMap::new();
        for field in self.iter() {
            map.entry(field.category()).or_default().push(field);
        }
        map
    }
}

impl FromIterator<MetadataField> for FieldSet {
    fn from_iter<T: IntoIterator<Item = MetadataField>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<FieldSet> for BTreeMap<MetadataCategory, Vec<MetadataField>> {
    fn from(set: FieldSet) -> Self {
        set.by_category()
    }
}

impl TryFrom<BTreeMap<MetadataCategory, Vec<MetadataField>>> for FieldSet {
    type Error = MetadataError;

    fn try_from(map: BTreeMap<MetadataCategory, Vec<MetadataField>>) -> Result<Self, Self::Error> {
        let mut set = FieldSet::new();
        for (category, fields) in map {
            for field in fields {
                if field.category() != category {
                    return Err(MetadataError::UnknownField {
                        category: category.name().to_string(),
                        field: field.name().to_string(),
                    });
                }
                set.insert(field);
            }
        }
        Ok(set)
    }
}

// ---------------------------------------------------------------------------
// Token codec
// ---------------------------------------------------------------------------

/// Encode a field set as a metadata token. An empty set encodes to "".
pub fn encode(fields: &FieldSet) -> String {
    let mut token = String::new();
    for category in MetadataCategory::ALL {
        let mut codes: Vec<u8> = fields.in_category(category).map(|f| f.code()).collect();
        if codes.is_empty() {
            continue;
        }
        codes.sort_unstable();
        token.push(category.letter());
        for code in codes {
            token.push(char::from(b'0' + code));
        }
    }
    token
}

/// Encode raw category/field names, failing on anything unknown.
pub fn encode_names<C, F, S>(categories: C) -> MetadataResult<String>
where
    C: IntoIterator<Item = (S, F)>,
    F: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    FieldSet::from_names(categories).map(|set| encode(&set))
}

/// Decode a metadata token.
///
/// Unknown digits under a known category are skipped so newer field codes
/// do not break older services. An unknown letter rejects the whole token.
pub fn decode(token: &str) -> MetadataResult<FieldSet> {
    let mut set = FieldSet::new();
    let mut current: Option<MetadataCategory> = None;

    for ch in token.chars() {
        if let Some(digit) = ch.to_digit(10) {
            let category = current.ok_or(MetadataError::OrphanCode(ch))?;
            match MetadataField::from_code(category, digit as u8) {
                Some(field) => {
                    set.insert(field);
                }
                None => {
                    tracing::debug!(
                        category = %category,
                        code = digit,
                        "ignoring unknown metadata code"
                    );
                }
            }
            continue;
        }

        let category =
            MetadataCategory::from_letter(ch).ok_or(MetadataError::UnknownCategoryLetter(ch))?;
        if matches!(current, Some(prev) if category <= prev) {
            return Err(MetadataError::CategoryOrder(ch));
        }
        current = Some(category);
    }

    Ok(set)
}
