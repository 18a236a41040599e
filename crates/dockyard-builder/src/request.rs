//! Application version build requests.

use bytes::Bytes;
use dockyard_core::build::{ApplicationVersionBuildBundle, ImageBuildBundle};
use dockyard_core::id::ClientKey;
use dockyard_core::image::Image;
use dockyard_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

use crate::context::ContextCompiler;

/// One image to build and the functions that will run in it.
#[derive(Debug, Clone)]
pub struct ImageBuildRequest {
    image: Image,
    function_names: Vec<String>,
}

impl ImageBuildRequest {
    pub fn new(image: Image, function_names: Vec<String>) -> Result<Self> {
        validate_function_names(&function_names)?;
        Ok(Self {
            image,
            function_names,
        })
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    /// Compile the build context off the async runtime and mint a fresh key.
    async fn synthesize(&self, compiler: Arc<dyn ContextCompiler>) -> Result<ImageBuildBundle> {
        let image = self.image.clone();
        let context = tokio::task::spawn_blocking(move || compiler.compile(&image))
            .await
            .map_err(|e| Error::Internal(format!("context compilation task failed: {}", e)))??;

        debug!(image = %self.image.name, bytes = context.len(), "Synthesized image build");

        Ok(ImageBuildBundle {
            key: ClientKey::new(),
            name: Some(self.image.name.clone()),
            description: None,
            context: Bytes::from(context),
            function_names: self.function_names.clone(),
        })
    }
}

fn validate_function_names(function_names: &[String]) -> Result<()> {
    if function_names.is_empty() {
        return Err(Error::InvalidInput(
            "function names cannot be empty".to_string(),
        ));
    }
    if function_names.iter().any(|name| name.is_empty()) {
        return Err(Error::InvalidInput(
            "function names must be non-empty strings".to_string(),
        ));
    }
    Ok(())
}

/// All images of one named, versioned application.
#[derive(Debug, Clone)]
pub struct ApplicationVersionBuildRequest {
    name: String,
    version: String,
    images: Vec<ImageBuildRequest>,
}

impl ApplicationVersionBuildRequest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let version = version.into();
        if name.is_empty() {
            return Err(Error::InvalidInput("name cannot be empty".to_string()));
        }
        if version.is_empty() {
            return Err(Error::InvalidInput("version cannot be empty".to_string()));
        }
        Ok(Self {
            name,
            version,
            images: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn images(&self) -> &[ImageBuildRequest] {
        &self.images
    }

    /// Add an image. Leaves the request untouched when `function_names` is
    /// empty or contains an empty name.
    pub fn add_image(
        &mut self,
        image: Image,
        function_names: Vec<String>,
    ) -> Result<&ImageBuildRequest> {
        let request = ImageBuildRequest::new(image, function_names)?;
        self.images.push(request);
        Ok(&self.images[self.images.len() - 1])
    }

    /// Build the wire bundle. Every call mints new image keys.
    pub async fn synthesize(
        &self,
        compiler: Arc<dyn ContextCompiler>,
    ) -> Result<ApplicationVersionBuildBundle> {
        let mut images = Vec::with_capacity(self.images.len());
        for image in &self.images {
            images.push(image.synthesize(compiler.clone()).await?);
        }

        Ok(ApplicationVersionBuildBundle {
            name: self.name.clone(),
            version: self.version.clone(),
            images,
        })
    }
}
