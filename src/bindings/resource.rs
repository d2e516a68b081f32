// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shared handles to bindable GPU objects.

Each wrapper owns a native backend object. They are shared through [`Arc`]: a binding holds a
strong reference for as long as it is bound, and two bindings are the same when they point at
the same allocation. Binding never mutates the object.
*/

use crate::imp::Backend;
use crate::shader::reflection::ResourceType;
use std::sync::Arc;

#[derive(Debug)]
pub struct ConstantBuffer<B: Backend> {
    native: B::Buffer,
    size: u32,
    debug_name: String,
}

impl<B: Backend> ConstantBuffer<B> {
    pub fn new(native: B::Buffer, size: u32, debug_name: impl Into<String>) -> Self {
        ConstantBuffer {
            native,
            size,
            debug_name: debug_name.into(),
        }
    }

    pub fn native(&self) -> &B::Buffer {
        &self.native
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

#[derive(Debug)]
pub struct SamplerState<B: Backend> {
    native: B::Sampler,
    debug_name: String,
}

impl<B: Backend> SamplerState<B> {
    pub fn new(native: B::Sampler, debug_name: impl Into<String>) -> Self {
        SamplerState {
            native,
            debug_name: debug_name.into(),
        }
    }

    pub fn native(&self) -> &B::Sampler {
        &self.native
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

/**
A read-only shader resource: a texture or buffer seen through a shader resource view.

A texture may carry a default sampler. When the texture is bound through a slot that a program
pairs with a sampler, and no sampler is explicitly bound in that sampler's slot, the default is
used instead.
*/
#[derive(Debug)]
pub struct ShaderResource<B: Backend> {
    native: B::ShaderResourceView,
    resource_type: ResourceType,
    default_sampler: Option<Arc<SamplerState<B>>>,
    debug_name: String,
}

impl<B: Backend> ShaderResource<B> {
    pub fn new(native: B::ShaderResourceView, resource_type: ResourceType, debug_name: impl Into<String>) -> Self {
        ShaderResource {
            native,
            resource_type,
            default_sampler: None,
            debug_name: debug_name.into(),
        }
    }

    pub fn with_default_sampler(mut self, sampler: Arc<SamplerState<B>>) -> Self {
        self.default_sampler = Some(sampler);
        self
    }

    pub fn native(&self) -> &B::ShaderResourceView {
        &self.native
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn default_sampler(&self) -> Option<&Arc<SamplerState<B>>> {
        self.default_sampler.as_ref()
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

/// A resource shaders may write, seen through an unordered access view.
#[derive(Debug)]
pub struct RWResource<B: Backend> {
    native: B::UnorderedAccessView,
    resource_type: ResourceType,
    debug_name: String,
}

impl<B: Backend> RWResource<B> {
    pub fn new(native: B::UnorderedAccessView, resource_type: ResourceType, debug_name: impl Into<String>) -> Self {
        RWResource {
            native,
            resource_type,
            debug_name: debug_name.into(),
        }
    }

    pub fn native(&self) -> &B::UnorderedAccessView {
        &self.native
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

#[derive(Debug)]
pub struct RenderTarget<B: Backend> {
    native: B::RenderTargetView,
    debug_name: String,
}

impl<B: Backend> RenderTarget<B> {
    pub fn new(native: B::RenderTargetView, debug_name: impl Into<String>) -> Self {
        RenderTarget {
            native,
            debug_name: debug_name.into(),
        }
    }

    pub fn native(&self) -> &B::RenderTargetView {
        &self.native
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

#[derive(Debug)]
pub struct DepthTarget<B: Backend> {
    native: B::DepthStencilView,
    debug_name: String,
}

impl<B: Backend> DepthTarget<B> {
    pub fn new(native: B::DepthStencilView, debug_name: impl Into<String>) -> Self {
        DepthTarget {
            native,
            debug_name: debug_name.into(),
        }
    }

    pub fn native(&self) -> &B::DepthStencilView {
        &self.native
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
