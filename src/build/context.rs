// ABOUTME: BuildContext: source directory, recipe file, target image and build args.
// ABOUTME: Checked up front so a missing directory fails before any tool runs.

use super::error::BuildError;
use crate::types::ImageRef;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BuildContext {
    root: PathBuf,
    recipe: PathBuf,
    image: ImageRef,
    tag: String,
    args: BTreeMap<String, String>,
}

impl BuildContext {
    /// `recipe` is relative to `root`. `image` names the repository.
    pub fn new(
        root: impl Into<PathBuf>,
        recipe: impl Into<PathBuf>,
        image: ImageRef,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            recipe: recipe.into(),
            image,
            tag: tag.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = (String, String)>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recipe_path(&self) -> PathBuf {
        self.root.join(&self.recipe)
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn build_args(&self) -> &BTreeMap<String, String> {
        &self.args
    }

    /// `repository:tag` the built image is stored under.
    pub fn target(&self) -> Result<ImageRef, BuildError> {
        self.image
            .with_tag(&self.tag)
            .map_err(|e| BuildError::prepare(e.to_string()))
    }

    /// Fails with stage `prepare` if the directory or recipe is missing.
    pub fn check(&self) -> Result<(), BuildError> {
        if !self.root.is_dir() {
            return Err(BuildError::prepare(format!(
                "build context {} is not a directory",
                self.root.display()
            )));
        }
        let recipe = self.recipe_path();
        if !recipe.is_file() {
            return Err(BuildError::prepare(format!(
                "recipe {} not found",
                recipe.display()
            )));
        }
        self.target().map(|_| ())
    }
}

