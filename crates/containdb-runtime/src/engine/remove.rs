//! List and remove flows.
//!
//! Image and volume removal always asks the registry whether a container,
//! running or stopped, still references the resource; a reference refuses
//! the removal and names the owner.

use containdb_common::catalog::{canonical_volumes, database_images, tool_images};
use containdb_common::error::{ContainDbError, Result};
use containdb_common::types::{ResourceClass, ResourceHandle, ResourceStatus};

use super::{AbortReason, Engine, Operator, Outcome, Question};
use crate::backend::ContainerRuntime;

fn removed(class: ResourceClass, name: String) -> Outcome {
    Outcome::Removed(ResourceHandle::new(class, name, ResourceStatus::Absent))
}

impl<R: ContainerRuntime> Engine<R> {
    pub(super) fn list(&self) -> Result<Outcome> {
        let running = self.registry().list_running(&database_images())?;
        if running.is_empty() {
            return Ok(Outcome::Nothing {
                what: "running databases",
            });
        }
        Ok(Outcome::Listed(running))
    }

    pub(super) fn remove_container(&self, operator: &mut dyn Operator) -> Result<Outcome> {
        let mut images = database_images();
        images.extend(tool_images());
        let names: Vec<String> = self
            .registry()
            .list_running(&images)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        if names.is_empty() {
            return Ok(Outcome::Nothing {
                what: "running databases to remove",
            });
        }
        let Some(name) = Self::pick(operator, "Select database to remove", &names)? else {
            return Ok(Outcome::Aborted(AbortReason::UserExit));
        };
        self.run(&self.builder.force_remove_container(&name))?;
        tracing::info!(container = %name, "container removed");
        Ok(removed(ResourceClass::Container, name))
    }

    pub(super) fn remove_image(&self, operator: &mut dyn Operator) -> Result<Outcome> {
        let registry = self.registry();
        let images = registry.list_images(&database_images())?;
        if images.is_empty() {
            return Ok(Outcome::Nothing {
                what: "database images",
            });
        }
        let Some(reference) = Self::pick(operator, "Select image to remove", &images)? else {
            return Ok(Outcome::Aborted(AbortReason::UserExit));
        };

        let usage = registry.is_image_in_use(&reference)?;
        if usage.in_use {
            return Err(ContainDbError::InUse {
                kind: "image",
                name: reference,
                owner: usage.owner.unwrap_or_default(),
            });
        }
        if !operator.confirm(&Question::RemoveImage {
            reference: reference.clone(),
        })? {
            return Ok(Outcome::Aborted(AbortReason::Declined));
        }
        self.run(&self.builder.remove_image(&reference))?;
        tracing::info!(image = %reference, "image removed");
        Ok(removed(ResourceClass::Image, reference))
    }

    pub(super) fn remove_volume(&self, operator: &mut dyn Operator) -> Result<Outcome> {
        let registry = self.registry();
        let volumes = registry.list_volumes(&canonical_volumes())?;
        if volumes.is_empty() {
            return Ok(Outcome::Nothing {
                what: "database volumes",
            });
        }
        let Some(name) = Self::pick(operator, "Select volume to remove", &volumes)? else {
            return Ok(Outcome::Aborted(AbortReason::UserExit));
        };

        let usage = registry.is_volume_in_use(&name)?;
        if usage.in_use {
            return Err(ContainDbError::InUse {
                kind: "volume",
                name,
                owner: usage.owner.unwrap_or_default(),
            });
        }
        if !operator.confirm(&Question::RemoveVolume { name: name.clone() })? {
            return Ok(Outcome::Aborted(AbortReason::Declined));
        }
        self.run(&self.builder.remove_volume(&name))?;
        tracing::info!(volume = %name, "volume removed");
        Ok(removed(ResourceClass::Volume, name))
    }
}
