//! Images sessions are launched from.

use bon::Builder;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::resource::ImageLimit;

/// The placeholder shown before an image or tag has been chosen.
pub const NOT_SELECTED: &str = "Not Selected";

/// A container image and the resource bounds it declares.
#[derive(Builder, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[builder(builder_type = Builder)]
pub struct Image {
    /// The image name (including its registry and namespace).
    #[builder(into)]
    name: String,

    /// The image tag.
    #[builder(into)]
    tag: String,

    /// The architecture the image is built for.
    #[serde(default)]
    #[builder(into)]
    architecture: Option<String>,

    /// The per-slot bounds the image declares.
    #[serde(default)]
    #[builder(default)]
    limits: IndexMap<String, ImageLimit>,
}

impl Image {
    /// Gets the image name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the image tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Gets the architecture the image is built for.
    pub fn architecture(&self) -> Option<&str> {
        self.architecture.as_deref()
    }

    /// Gets the per-slot bounds the image declares.
    pub fn limits(&self) -> &IndexMap<String, ImageLimit> {
        &self.limits
    }

    /// Whether both the image and its tag have been chosen.
    pub fn is_selected(&self) -> bool {
        let chosen = |value: &str| {
            let value = value.trim();
            !value.is_empty() && value != NOT_SELECTED
        };

        chosen(&self.name) && chosen(&self.tag)
    }

    /// Gets the kernel reference (`<name>:<tag>`) handed to the broker.
    pub fn kernel_ref(&self) -> String {
        format!("{name}:{tag}", name = self.name, tag = self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_not_selected() {
        assert!(!Image::default().is_selected());

        let image = Image::builder()
            .name("cr.backend.ai/stable/python")
            .tag(NOT_SELECTED)
            .build();
        assert!(!image.is_selected());

        let image = Image::builder()
            .name("cr.backend.ai/stable/python")
            .tag("3.9-ubuntu20.04")
            .build();
        assert!(image.is_selected());
        assert_eq!(
            image.kernel_ref(),
            "cr.backend.ai/stable/python:3.9-ubuntu20.04"
        );
    }
}
