//! Supplier product submission: client-side style validation of a product
//! with its declared attributes and variants, and coarse upload progress.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A file received from the client, waiting to go to the media host.
#[derive(Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// JSON part of the submission form.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub variants: Vec<VariantForm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantForm {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    pub price: Option<i64>,
    pub stock: Option<i64>,
}

#[derive(Debug)]
pub struct VariantSubmission {
    pub values: BTreeMap<String, String>,
    pub price: Option<i64>,
    pub stock: Option<i64>,
    pub image: Option<MediaFile>,
}

#[derive(Debug)]
pub struct ProductSubmission {
    pub form: ProductForm,
    pub images: Vec<MediaFile>,
    pub video: Option<MediaFile>,
    pub variants: Vec<VariantSubmission>,
}

/// A submission that passed validation; every variant field is present.
#[derive(Debug)]
pub struct ValidProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: Option<String>,
    pub attributes: Vec<String>,
    pub images: Vec<MediaFile>,
    pub video: Option<MediaFile>,
    pub variants: Vec<ValidVariant>,
}

#[derive(Debug)]
pub struct ValidVariant {
    pub values: BTreeMap<String, String>,
    pub price: i64,
    pub stock: i32,
    pub image: MediaFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum SubmissionIssue {
    MissingName,
    MissingCategory,
    BlankAttribute,
    DuplicateAttribute { attribute: String },
    NoVariants,
    MissingAttributeValue { variant: usize, attribute: String },
    UndeclaredAttribute { variant: usize, attribute: String },
    MissingPrice { variant: usize },
    InvalidPrice { variant: usize },
    MissingStock { variant: usize },
    InvalidStock { variant: usize },
    MissingImage { variant: usize },
}

impl fmt::Display for SubmissionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionIssue::MissingName => write!(f, "product name is required"),
            SubmissionIssue::MissingCategory => write!(f, "product category is required"),
            SubmissionIssue::BlankAttribute => write!(f, "attribute names must not be blank"),
            SubmissionIssue::DuplicateAttribute { attribute } => {
                write!(f, "attribute '{attribute}' is declared twice")
            }
            SubmissionIssue::NoVariants => write!(f, "at least one variant is required"),
            SubmissionIssue::MissingAttributeValue { variant, attribute } => {
                write!(f, "variant {variant} has no value for '{attribute}'")
            }
            SubmissionIssue::UndeclaredAttribute { variant, attribute } => {
                write!(f, "variant {variant} sets undeclared attribute '{attribute}'")
            }
            SubmissionIssue::MissingPrice { variant } => write!(f, "variant {variant} has no price"),
            SubmissionIssue::InvalidPrice { variant } => {
                write!(f, "variant {variant} price must be greater than 0")
            }
            SubmissionIssue::MissingStock { variant } => write!(f, "variant {variant} has no stock"),
            SubmissionIssue::InvalidStock { variant } => {
                write!(f, "variant {variant} stock must be a non-negative integer")
            }
            SubmissionIssue::MissingImage { variant } => {
                write!(f, "variant {variant} needs exactly one image")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("product submission rejected: {}", join_issues(.0))]
    Invalid(Vec<SubmissionIssue>),
}

fn join_issues(issues: &[SubmissionIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects every problem rather than stopping at the first one, so the
/// supplier can fix the whole form in one go.
pub fn validate(submission: ProductSubmission) -> Result<ValidProduct, SubmissionError> {
    let ProductSubmission {
        form,
        images,
        video,
        variants,
    } = submission;
    let mut issues = Vec::new();

    if form.name.trim().is_empty() {
        issues.push(SubmissionIssue::MissingName);
    }
    if form.category.trim().is_empty() {
        issues.push(SubmissionIssue::MissingCategory);
    }

    let mut declared = BTreeSet::new();
    let mut attributes = Vec::with_capacity(form.attributes.len());
    for attribute in &form.attributes {
        let attribute = attribute.trim();
        if attribute.is_empty() {
            issues.push(SubmissionIssue::BlankAttribute);
        } else if !declared.insert(attribute.to_string()) {
            issues.push(SubmissionIssue::DuplicateAttribute {
                attribute: attribute.to_string(),
            });
        } else {
            attributes.push(attribute.to_string());
        }
    }

    if variants.is_empty() {
        issues.push(SubmissionIssue::NoVariants);
    }

    let mut valid_variants = Vec::with_capacity(variants.len());
    for (index, variant) in variants.into_iter().enumerate() {
        let before = issues.len();

        for attribute in &attributes {
            let present = variant
                .values
                .get(attribute)
                .is_some_and(|v| !v.trim().is_empty());
            if !present {
                issues.push(SubmissionIssue::MissingAttributeValue {
                    variant: index,
                    attribute: attribute.clone(),
                });
            }
        }
        for attribute in variant.values.keys() {
            if !declared.contains(attribute.trim()) {
                issues.push(SubmissionIssue::UndeclaredAttribute {
                    variant: index,
                    attribute: attribute.clone(),
                });
            }
        }

        let price = match variant.price {
            None => {
                issues.push(SubmissionIssue::MissingPrice { variant: index });
                None
            }
            Some(p) if p <= 0 => {
                issues.push(SubmissionIssue::InvalidPrice { variant: index });
                None
            }
            Some(p) => Some(p),
        };

        let stock = match variant.stock {
            None => {
                issues.push(SubmissionIssue::MissingStock { variant: index });
                None
            }
            Some(s) => match i32::try_from(s) {
                Ok(s) if s >= 0 => Some(s),
                _ => {
                    issues.push(SubmissionIssue::InvalidStock { variant: index });
                    None
                }
            },
        };

        if variant.image.is_none() {
            issues.push(SubmissionIssue::MissingImage { variant: index });
        }

        if issues.len() != before {
            continue;
        }
        if let (Some(price), Some(stock), Some(image)) = (price, stock, variant.image) {
            let values = variant
                .values
                .into_iter()
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();
            valid_variants.push(ValidVariant {
                values,
                price,
                stock,
                image,
            });
        }
    }

    if !issues.is_empty() {
        return Err(SubmissionError::Invalid(issues));
    }

    Ok(ValidProduct {
        name: form.name.trim().to_string(),
        description: form.description,
        category: form.category.trim().to_string(),
        brand: form.brand,
        attributes,
        images,
        video,
        variants: valid_variants,
    })
}

/// Progress across product media and variants, counted in whole steps.
#[derive(Debug)]
pub struct UploadProgress {
    total: usize,
    completed: AtomicUsize,
}

impl UploadProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn for_product(product: &ValidProduct) -> Self {
        let media = product.images.len() + usize::from(product.video.is_some());
        Self::new(media + product.variants.len())
    }

    /// Marks one step done and returns the new percentage.
    pub fn advance(&self) -> u8 {
        let done = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        Self::percent_of(done, self.total)
    }

    pub fn percent(&self) -> u8 {
        Self::percent_of(self.completed.load(Ordering::Acquire), self.total)
    }

    fn percent_of(done: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        let pct = done.min(total) * 100 / total;
        pct as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> MediaFile {
        MediaFile {
            file_name: name.into(),
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        }
    }

    fn variant(color: &str, size: &str) -> VariantSubmission {
        VariantSubmission {
            values: [
                ("color".to_string(), color.to_string()),
                ("size".to_string(), size.to_string()),
            ]
            .into_iter()
            .collect(),
            price: Some(1500),
            stock: Some(4),
            image: Some(file("v.png")),
        }
    }

    fn submission(variants: Vec<VariantSubmission>) -> ProductSubmission {
        ProductSubmission {
            form: ProductForm {
                name: "Habesha Kemis".into(),
                description: None,
                category: "clothing".into(),
                brand: None,
                attributes: vec!["color".into(), "size".into()],
                variants: Vec::new(),
            },
            images: vec![file("front.png")],
            video: None,
            variants,
        }
    }

    fn issues(result: Result<ValidProduct, SubmissionError>) -> Vec<SubmissionIssue> {
        match result {
            Err(SubmissionError::Invalid(issues)) => issues,
            Ok(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn complete_submission_is_accepted() {
        let valid = validate(submission(vec![variant("white", "M"), variant("red", "L")])).unwrap();
        assert_eq!(valid.variants.len(), 2);
        assert_eq!(valid.attributes, vec!["color", "size"]);
    }

    #[test]
    fn every_missing_field_is_reported() {
        let mut no_price = variant("white", "M");
        no_price.price = None;
        let mut no_stock = variant("white", "L");
        no_stock.stock = None;
        let mut no_image = variant("red", "M");
        no_image.image = None;
        let mut no_size = variant("red", "L");
        no_size.values.remove("size");

        let found = issues(validate(submission(vec![
            no_price, no_stock, no_image, no_size,
        ])));
        assert_eq!(
            found,
            vec![
                SubmissionIssue::MissingPrice { variant: 0 },
                SubmissionIssue::MissingStock { variant: 1 },
                SubmissionIssue::MissingImage { variant: 2 },
                SubmissionIssue::MissingAttributeValue {
                    variant: 3,
                    attribute: "size".into()
                },
            ]
        );
    }

    #[test]
    fn blank_values_and_bad_numbers_are_rejected() {
        let mut blank = variant(" ", "M");
        blank.price = Some(0);
        blank.stock = Some(-1);
        let found = issues(validate(submission(vec![blank])));
        assert!(found.contains(&SubmissionIssue::MissingAttributeValue {
            variant: 0,
            attribute: "color".into()
        }));
        assert!(found.contains(&SubmissionIssue::InvalidPrice { variant: 0 }));
        assert!(found.contains(&SubmissionIssue::InvalidStock { variant: 0 }));
    }

    #[test]
    fn undeclared_attributes_and_no_variants_are_rejected() {
        let mut extra = variant("white", "M");
        extra.values.insert("material".into(), "cotton".into());
        assert_eq!(
            issues(validate(submission(vec![extra]))),
            vec![SubmissionIssue::UndeclaredAttribute {
                variant: 0,
                attribute: "material".into()
            }]
        );
        assert_eq!(
            issues(validate(submission(Vec::new()))),
            vec![SubmissionIssue::NoVariants]
        );
    }

    #[test]
    fn progress_counts_media_and_variants() {
        let valid = validate(submission(vec![variant("white", "M"), variant("red", "L")])).unwrap();
        let progress = UploadProgress::for_product(&valid);
        assert_eq!(progress.percent(), 0);
        assert_eq!(progress.advance(), 33);
        assert_eq!(progress.advance(), 66);
        assert_eq!(progress.advance(), 100);
        assert_eq!(progress.advance(), 100);
        assert_eq!(UploadProgress::new(0).percent(), 100);
    }
}
