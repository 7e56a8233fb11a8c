// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Depth peeling on OpenGL.
//!
//! The classic two-depth-buffer scheme: the opaque pre-pass depth and the previous
//! layer's depth are copied into depth textures with depth comparison enabled and bound
//! on texture units taken from the pool, so the scene's shaders can reject every
//! fragment that is hidden by opaque geometry or already peeled. Each layer's colour is
//! copied into its own RGBA texture and the layers are blended back to front at the
//! end of the frame.

use std::fmt;
use std::rc::Rc;

use glow::HasContext;
use strata_core::{
    LayerHandle, LayerStorageError, PeelPass, PeelingTarget, TextureUnit, TextureUnitAllocator,
};

/// Units used while peeling: opaque depth, previous layer depth, and a scratch unit
/// for colour copies and compositing.
const REQUIRED_UNITS: usize = 3;

/// The program used to draw a layer over the framebuffer.
///
/// It must draw a full-screen triangle from `gl_VertexID` alone (no vertex
/// attributes are bound) and output the texel of the sampler at `texture_uniform`,
/// with premultiplied alpha.
#[derive(Debug, Clone)]
pub struct CompositeProgram {
    /// The linked program.
    pub program: glow::Program,
    /// Location of the `sampler2D` uniform holding the layer.
    pub texture_uniform: Option<glow::UniformLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Viewport {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Viewport {
    fn pixels(self) -> u64 {
        (self.width.max(0) as u64) * (self.height.max(0) as u64)
    }
}

/// Integer state read back by [`SavedState::capture`], in [`SavedState::from_raw`] order.
const SAVED_INTEGERS: [u32; 7] = [
    glow::ACTIVE_TEXTURE,
    glow::DEPTH_FUNC,
    glow::DEPTH_WRITEMASK,
    glow::BLEND_SRC_RGB,
    glow::BLEND_DST_RGB,
    glow::BLEND_SRC_ALPHA,
    glow::BLEND_DST_ALPHA,
];

/// The fixed-function state a peeling frame or a plain translucent pass overwrites.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SavedState {
    blend: bool,
    depth_test: bool,
    depth_mask: bool,
    depth_func: u32,
    /// Source RGB, destination RGB, source alpha, destination alpha.
    blend_factors: [u32; 4],
    clear_color: [f32; 4],
    active_texture: u32,
}

impl SavedState {
    fn from_raw(blend: bool, depth_test: bool, integers: [i32; 7], clear_color: [f32; 4]) -> Self {
        let [active_texture, depth_func, depth_mask, src_rgb, dst_rgb, src_alpha, dst_alpha] =
            integers.map(|value| value as u32);
        Self {
            blend,
            depth_test,
            depth_mask: depth_mask != 0,
            depth_func,
            blend_factors: [src_rgb, dst_rgb, src_alpha, dst_alpha],
            clear_color,
            active_texture,
        }
    }

    fn capture(gl: &glow::Context) -> Self {
        let mut clear_color = [0.0f32; 4];
        unsafe {
            gl.get_parameter_f32_slice(glow::COLOR_CLEAR_VALUE, &mut clear_color);
            Self::from_raw(
                gl.is_enabled(glow::BLEND),
                gl.is_enabled(glow::DEPTH_TEST),
                SAVED_INTEGERS.map(|parameter| gl.get_parameter_i32(parameter)),
                clear_color,
            )
        }
    }

    fn restore(&self, gl: &glow::Context) {
        let [src_rgb, dst_rgb, src_alpha, dst_alpha] = self.blend_factors;
        let [red, green, blue, alpha] = self.clear_color;
        unsafe {
            gl.active_texture(self.active_texture);
            if self.blend {
                gl.enable(glow::BLEND);
            } else {
                gl.disable(glow::BLEND);
            }
            if self.depth_test {
                gl.enable(glow::DEPTH_TEST);
            } else {
                gl.disable(glow::DEPTH_TEST);
            }
            gl.blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha);
            gl.depth_func(self.depth_func);
            gl.depth_mask(self.depth_mask);
            gl.clear_color(red, green, blue, alpha);
        }
    }
}

#[derive(Debug)]
struct PeelResources {
    opaque_depth_unit: TextureUnit,
    previous_depth_unit: TextureUnit,
    scratch_unit: TextureUnit,
    opaque_depth: glow::Texture,
    opaque_color: glow::Texture,
    previous_depth: glow::Texture,
    query: glow::Query,
    vertex_array: glow::VertexArray,
    viewport: Viewport,
    saved: SavedState,
}

/// A [`PeelingTarget`] rendering into the currently bound framebuffer.
pub struct GlPeelingTarget {
    gl: Rc<glow::Context>,
    composite: CompositeProgram,
    resources: Option<PeelResources>,
    plain_saved: Option<SavedState>,
    layers: Vec<(LayerHandle, glow::Texture)>,
    query_active: bool,
    next_handle: u64,
}

impl GlPeelingTarget {
    /// Creates a target that composites with `composite`.
    pub fn new(gl: Rc<glow::Context>, composite: CompositeProgram) -> Self {
        Self {
            gl,
            composite,
            resources: None,
            plain_saved: None,
            layers: Vec::new(),
            query_active: false,
            next_handle: 0,
        }
    }

    /// Number of layer textures currently alive.
    pub fn live_layers(&self) -> usize {
        self.layers.len()
    }

    fn current_viewport(&self) -> Viewport {
        let mut raw = [0i32; 4];
        unsafe { self.gl.get_parameter_i32_slice(glow::VIEWPORT, &mut raw) };
        Viewport {
            x: raw[0],
            y: raw[1],
            width: raw[2],
            height: raw[3],
        }
    }

    fn out_of_memory(&self) -> bool {
        let mut out_of_memory = false;
        // Drain every pending flag; more than one may be set.
        for _ in 0..16 {
            match unsafe { self.gl.get_error() } {
                glow::NO_ERROR => break,
                glow::OUT_OF_MEMORY => out_of_memory = true,
                other => log::debug!("Ignoring GL error 0x{other:04X} during layer allocation"),
            }
        }
        out_of_memory
    }

    /// Creates a texture on `unit` and fills it by copying the framebuffer.
    fn copy_framebuffer_into_new_texture(
        &self,
        unit: TextureUnit,
        internal_format: u32,
        viewport: Viewport,
        depth_compare: Option<u32>,
    ) -> Result<glow::Texture, LayerStorageError> {
        let gl = &self.gl;
        unsafe {
            let texture = gl.create_texture().map_err(LayerStorageError::Backend)?;
            gl.active_texture(glow::TEXTURE0 + unit.index());
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            if let Some(func) = depth_compare {
                gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_COMPARE_MODE,
                    glow::COMPARE_REF_TO_TEXTURE as i32,
                );
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_COMPARE_FUNC, func as i32);
            }
            gl.copy_tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format,
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                0,
            );
            Ok(texture)
        }
    }

    fn capture_opaque(
        &self,
        textures: &mut Vec<glow::Texture>,
        [opaque_depth_unit, scratch_unit, previous_depth_unit]: [TextureUnit; 3],
        viewport: Viewport,
    ) -> Result<(), LayerStorageError> {
        textures.push(self.copy_framebuffer_into_new_texture(
            opaque_depth_unit,
            glow::DEPTH_COMPONENT24,
            viewport,
            Some(glow::LESS),
        )?);
        textures.push(self.copy_framebuffer_into_new_texture(
            scratch_unit,
            glow::RGBA8,
            viewport,
            None,
        )?);
        textures.push(self.copy_framebuffer_into_new_texture(
            previous_depth_unit,
            glow::DEPTH_COMPONENT24,
            viewport,
            Some(glow::GREATER),
        )?);
        if self.out_of_memory() {
            return Err(LayerStorageError::OutOfMemory { layer: None });
        }
        Ok(())
    }

    fn create_query_objects(&self) -> Result<(glow::Query, glow::VertexArray), LayerStorageError> {
        let gl = &self.gl;
        unsafe {
            let query = gl.create_query().map_err(LayerStorageError::Backend)?;
            match gl.create_vertex_array() {
                Ok(vertex_array) => Ok((query, vertex_array)),
                Err(err) => {
                    gl.delete_query(query);
                    Err(LayerStorageError::Backend(err))
                }
            }
        }
    }

    fn acquire_units(units: &mut TextureUnitAllocator) -> Result<Vec<TextureUnit>, LayerStorageError> {
        let mut acquired = Vec::with_capacity(REQUIRED_UNITS);
        for _ in 0..REQUIRED_UNITS {
            match units.acquire() {
                Some(unit) => acquired.push(unit),
                None => {
                    Self::release_units(units, &acquired);
                    return Err(LayerStorageError::TextureUnitsExhausted {
                        required: REQUIRED_UNITS,
                    });
                }
            }
        }
        Ok(acquired)
    }

    fn release_units(units: &mut TextureUnitAllocator, acquired: &[TextureUnit]) {
        for unit in acquired {
            if let Err(err) = units.release(*unit) {
                log::warn!("{err}");
            }
        }
    }

    fn delete_textures(&self, textures: &[glow::Texture]) {
        for texture in textures {
            unsafe { self.gl.delete_texture(*texture) };
        }
    }

    fn draw_fullscreen(&self, texture: glow::Texture) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.draw_arrays(glow::TRIANGLES, 0, 3);
        }
    }
}

impl fmt::Debug for GlPeelingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlPeelingTarget")
            .field("composite", &self.composite)
            .field("peeling", &self.resources.is_some())
            .field("live_layers", &self.layers.len())
            .finish_non_exhaustive()
    }
}

impl PeelingTarget for GlPeelingTarget {
    fn begin_peeling(&mut self, units: &mut TextureUnitAllocator) -> Result<(), LayerStorageError> {
        let acquired = Self::acquire_units(units)?;
        let (opaque_depth_unit, previous_depth_unit, scratch_unit) =
            (acquired[0], acquired[1], acquired[2]);
        let viewport = self.current_viewport();
        let saved = SavedState::capture(&self.gl);
        // Clear stale flags so only allocation failures are seen below.
        self.out_of_memory();

        // --- 1. Capture the opaque pre-pass and allocate the previous-depth storage ---
        let mut textures = Vec::with_capacity(3);
        let captured = self.capture_opaque(
            &mut textures,
            [opaque_depth_unit, scratch_unit, previous_depth_unit],
            viewport,
        );
        // --- 2. Occlusion query and an empty vertex array for compositing ---
        let objects = captured.and_then(|()| self.create_query_objects());
        let (query, vertex_array) = match objects {
            Ok(objects) => objects,
            Err(err) => {
                self.delete_textures(&textures);
                Self::release_units(units, &acquired);
                return Err(err);
            }
        };

        log::debug!(
            "Depth peeling on {}x{} with units {opaque_depth_unit}, {previous_depth_unit}, {scratch_unit}",
            viewport.width,
            viewport.height
        );
        self.resources = Some(PeelResources {
            opaque_depth_unit,
            previous_depth_unit,
            scratch_unit,
            opaque_depth: textures[0],
            opaque_color: textures[1],
            previous_depth: textures[2],
            query,
            vertex_array,
            viewport,
            saved,
        });
        Ok(())
    }

    fn begin_layer(&mut self, layer: u32) -> Result<PeelPass, LayerStorageError> {
        let Some(res) = &self.resources else {
            return Err(LayerStorageError::Backend(
                "begin_layer called outside of a peeling frame".to_string(),
            ));
        };
        let (scratch_unit, opaque_depth_unit, previous_depth_unit) =
            (res.scratch_unit, res.opaque_depth_unit, res.previous_depth_unit);
        let (opaque_depth, previous_depth, query, viewport) =
            (res.opaque_depth, res.previous_depth, res.query, res.viewport);

        let color = self.copy_framebuffer_into_new_texture(scratch_unit, glow::RGBA8, viewport, None)?;
        if self.out_of_memory() {
            self.delete_textures(&[color]);
            return Err(LayerStorageError::OutOfMemory { layer: Some(layer) });
        }

        let gl = &self.gl;
        unsafe {
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.depth_mask(true);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);
            gl.disable(glow::BLEND);

            gl.active_texture(glow::TEXTURE0 + opaque_depth_unit.index());
            gl.bind_texture(glow::TEXTURE_2D, Some(opaque_depth));
            gl.active_texture(glow::TEXTURE0 + previous_depth_unit.index());
            gl.bind_texture(glow::TEXTURE_2D, Some(previous_depth));

            gl.begin_query(glow::SAMPLES_PASSED, query);
        }
        self.query_active = true;

        let handle = LayerHandle(self.next_handle);
        self.next_handle += 1;
        self.layers.push((handle, color));

        Ok(PeelPass {
            layer,
            handle,
            opaque_depth_unit: Some(opaque_depth_unit),
            previous_depth_unit: (layer > 0).then_some(previous_depth_unit),
        })
    }

    fn end_layer(&mut self, pass: &PeelPass) -> u64 {
        let Some(res) = &self.resources else {
            return 0;
        };
        let Some(&(_, color)) = self.layers.iter().find(|(handle, _)| *handle == pass.handle) else {
            log::warn!("end_layer called for unknown layer {}", pass.layer);
            return 0;
        };
        let gl = &self.gl;
        let viewport = res.viewport;
        unsafe {
            gl.end_query(glow::SAMPLES_PASSED);

            gl.active_texture(glow::TEXTURE0 + res.scratch_unit.index());
            gl.bind_texture(glow::TEXTURE_2D, Some(color));
            gl.copy_tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
            );

            // This layer's depth is what the next one peels against.
            gl.active_texture(glow::TEXTURE0 + res.previous_depth_unit.index());
            gl.bind_texture(glow::TEXTURE_2D, Some(res.previous_depth));
            gl.copy_tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
            );
        }
        self.query_active = false;
        u64::from(unsafe { gl.get_query_parameter_u32(res.query, glow::QUERY_RESULT) })
    }

    fn discard_layer(&mut self, pass: PeelPass) {
        if self.query_active {
            unsafe { self.gl.end_query(glow::SAMPLES_PASSED) };
            self.query_active = false;
        }
        if let Some(index) = self.layers.iter().position(|(handle, _)| *handle == pass.handle) {
            let (_, texture) = self.layers.swap_remove(index);
            self.delete_textures(&[texture]);
        }
    }

    fn composite(&mut self, layers: &[LayerHandle]) {
        let Some(res) = &self.resources else {
            return;
        };
        let gl = &self.gl;
        unsafe {
            gl.disable(glow::DEPTH_TEST);
            gl.use_program(Some(self.composite.program));
            gl.bind_vertex_array(Some(res.vertex_array));
            gl.active_texture(glow::TEXTURE0 + res.scratch_unit.index());
            gl.uniform_1_i32(
                self.composite.texture_uniform.as_ref(),
                res.scratch_unit.index() as i32,
            );

            gl.disable(glow::BLEND);
        }
        self.draw_fullscreen(res.opaque_color);

        unsafe {
            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
        }
        for handle in layers.iter().rev() {
            match self.layers.iter().find(|(h, _)| h == handle) {
                Some(&(_, texture)) => self.draw_fullscreen(texture),
                None => log::warn!("Cannot composite unknown layer {handle:?}"),
            }
        }

        unsafe {
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
    }

    fn viewport_pixels(&self) -> u64 {
        match &self.resources {
            Some(res) => res.viewport.pixels(),
            None => self.current_viewport().pixels(),
        }
    }

    fn end_peeling(&mut self, units: &mut TextureUnitAllocator) {
        if self.query_active {
            unsafe { self.gl.end_query(glow::SAMPLES_PASSED) };
            self.query_active = false;
        }
        let layer_textures: Vec<glow::Texture> =
            self.layers.drain(..).map(|(_, texture)| texture).collect();
        self.delete_textures(&layer_textures);

        let Some(res) = self.resources.take() else {
            return;
        };
        self.delete_textures(&[res.opaque_depth, res.opaque_color, res.previous_depth]);
        let gl = &self.gl;
        unsafe {
            gl.delete_query(res.query);
            gl.delete_vertex_array(res.vertex_array);

            for unit in [res.opaque_depth_unit, res.previous_depth_unit, res.scratch_unit] {
                gl.active_texture(glow::TEXTURE0 + unit.index());
                gl.bind_texture(glow::TEXTURE_2D, None);
            }
        }
        res.saved.restore(gl);
        Self::release_units(
            units,
            &[res.opaque_depth_unit, res.previous_depth_unit, res.scratch_unit],
        );
    }

    fn begin_plain_translucent(&mut self) {
        self.plain_saved = Some(SavedState::capture(&self.gl));
        unsafe {
            self.gl.enable(glow::BLEND);
            self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            self.gl.depth_mask(false);
        }
    }

    fn end_plain_translucent(&mut self) {
        match self.plain_saved.take() {
            Some(saved) => saved.restore(&self.gl),
            None => unsafe { self.gl.depth_mask(true) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_pixel_count_ignores_negative_extents() {
        let viewport = Viewport {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
        };
        assert_eq!(viewport.pixels(), 307_200);
        let broken = Viewport {
            width: -1,
            ..viewport
        };
        assert_eq!(broken.pixels(), 0);
    }

    #[test]
    fn saved_state_reads_raw_queries_in_order() {
        let raw = [
            glow::TEXTURE3 as i32,
            glow::LEQUAL as i32,
            0,
            glow::SRC_ALPHA as i32,
            glow::ONE_MINUS_SRC_ALPHA as i32,
            glow::ONE as i32,
            glow::ZERO as i32,
        ];
        let saved = SavedState::from_raw(true, false, raw, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(
            saved,
            SavedState {
                blend: true,
                depth_test: false,
                depth_mask: false,
                depth_func: glow::LEQUAL,
                blend_factors: [glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA, glow::ONE, glow::ZERO],
                clear_color: [0.1, 0.2, 0.3, 1.0],
                active_texture: glow::TEXTURE3,
            }
        );

        let mut writable = raw;
        writable[2] = 1;
        assert!(SavedState::from_raw(false, true, writable, [0.0; 4]).depth_mask);
    }
}
