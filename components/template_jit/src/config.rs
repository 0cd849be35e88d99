//! Encoder configuration.

use core_types::JitError;
use serde::{Deserialize, Serialize};

/// Frame slots the entry helper fills, in the same frame coordinates as
/// template operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLayout {
    /// Slot holding the module environment pointer
    pub module_env_offset: i32,
    /// Slot holding the array buffer object pointer
    pub array_buffer_offset: i32,
    /// Slot holding the current heap length in bytes
    pub array_size_offset: i32,
    /// Added to the aligned frame size to form the base offset
    pub ebp_offset_correction: i32,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            module_env_offset: 4,
            array_buffer_offset: 8,
            array_size_offset: 12,
            ebp_offset_correction: 0,
        }
    }
}

/// Field offsets inside runtime objects the templates dereference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectLayout {
    /// Module memory: pointer to the array buffer object
    pub memory_table_offset: i32,
    /// Array buffer: byte length
    pub byte_length_offset: i32,
    /// Array buffer: pointer to the backing store
    pub buffer_offset: i32,
    /// Function object: pointer to its type
    pub type_offset: i32,
    /// Function type: pointer to the entry point info
    pub entry_point_info_offset: i32,
    /// Entry point info: native code address
    pub address_offset: i32,
}

impl Default for ObjectLayout {
    fn default() -> Self {
        Self {
            memory_table_offset: 0x10,
            byte_length_offset: 0x14,
            buffer_offset: 0x18,
            type_offset: 0x04,
            entry_point_info_offset: 0x14,
            address_offset: 0x08,
        }
    }
}

/// Limits and layouts for the template encoder.
///
/// # Examples
///
/// ```
/// use template_jit::TemplateConfig;
///
/// let config = TemplateConfig::from_json(r#"{ "buffer_capacity": 4096 }"#).unwrap();
/// assert_eq!(config.buffer_capacity, 4096);
/// assert_eq!(config.page_size, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Capacity of the code buffer allocated per function
    pub buffer_capacity: usize,
    /// Largest frame a templated function may reserve
    pub max_frame_size: u32,
    /// Frames up to this size are reserved with a plain `sub esp`; larger
    /// ones go through the stack-touching helper
    pub page_size: u32,
    /// Reserved frame slots
    pub frame: FrameLayout,
    /// Runtime object layout
    pub objects: ObjectLayout,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 64 * 1024,
            max_frame_size: 1024 * 1024,
            page_size: 4096,
            frame: FrameLayout::default(),
            objects: ObjectLayout::default(),
        }
    }
}

impl TemplateConfig {
    /// Parse a configuration from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, JitError> {
        let config: TemplateConfig =
            serde_json::from_str(json).map_err(|e| JitError::invalid_config(format!("template config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the encoder cannot work with.
    pub fn validate(&self) -> Result<(), JitError> {
        if self.buffer_capacity == 0 {
            return Err(JitError::invalid_config("buffer_capacity must be positive"));
        }
        if !self.page_size.is_power_of_two() {
            return Err(JitError::invalid_config(format!(
                "page_size must be a power of two, got {}",
                self.page_size
            )));
        }
        if self.max_frame_size > i32::MAX as u32 {
            return Err(JitError::invalid_config(format!(
                "max_frame_size {} does not fit a 32-bit displacement",
                self.max_frame_size
            )));
        }
        if self.max_frame_size < self.page_size {
            log::warn!(
                "max_frame_size {} is below page_size {}; large-frame probing is never used",
                self.max_frame_size,
                self.page_size
            );
        }
        Ok(())
    }
}
