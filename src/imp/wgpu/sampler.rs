// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::{AddressMode, FilterMode, SamplerDescriptor};

/// Filtering presets for samplers created through [`super::WgpuBackend::create_sampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    /// Trilinear filtering.
    Mipmapped,
    /// Linear minification, nearest magnification; for pixel-exact sampling.
    PixelLinear,
}

pub(super) fn sampler_descriptor(filter: SamplerFilter, label: &str) -> SamplerDescriptor<'_> {
    let (mag_filter, mipmap_filter) = match filter {
        SamplerFilter::Mipmapped => (FilterMode::Linear, FilterMode::Linear),
        SamplerFilter::PixelLinear => (FilterMode::Nearest, FilterMode::Nearest),
    };
    SamplerDescriptor {
        label: Some(label),
        address_mode_u: AddressMode::ClampToEdge,
        address_mode_v: AddressMode::ClampToEdge,
        address_mode_w: AddressMode::ClampToEdge,
        mag_filter,
        min_filter: FilterMode::Linear,
        mipmap_filter,
        lod_min_clamp: 0.0,
        lod_max_clamp: 14.0,
        compare: None,
        anisotropy_clamp: 1,
        border_color: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn pixel_linear_magnifies_nearest() {
        let descriptor = sampler_descriptor(SamplerFilter::PixelLinear, "Font");
        assert_eq!(descriptor.mag_filter, FilterMode::Nearest);
        assert_eq!(descriptor.min_filter, FilterMode::Linear);
        assert_eq!(descriptor.label, Some("Font"));
    }
}
