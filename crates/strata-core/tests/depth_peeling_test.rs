mod common;

use std::cell::Cell;

use common::{MockContext, MockScene, MockTarget, TargetEvent};
use strata_core::{
    BackendProfile, CapabilityQuery, ContextBinding, ContextGeneration, ContextState,
    DepthPeelingController, LayerHandle, PeelMode, PeelTermination, PeelingSettings,
    PeelingState, PlainBlendingReason, SymbolResolver, TextureUnitAllocator,
};

/// A capability source with a fixed token set that counts its lookups.
struct FixedCapabilities {
    generation: Option<ContextGeneration>,
    tokens: &'static [&'static str],
    lookups: Cell<u32>,
}

impl FixedCapabilities {
    fn new(tokens: &'static [&'static str]) -> Self {
        Self {
            generation: Some(ContextGeneration::next()),
            tokens,
            lookups: Cell::new(0),
        }
    }
}

impl CapabilityQuery for FixedCapabilities {
    fn generation(&self) -> Option<ContextGeneration> {
        self.generation
    }

    fn supports(&self, token: &str) -> bool {
        self.lookups.set(self.lookups.get() + 1);
        self.tokens.contains(&token)
    }
}

const PEELING_TOKENS: &[&str] = &["GL_ARB_depth_texture", "GL_ARB_shadow"];

fn units() -> TextureUnitAllocator {
    let mut units = TextureUnitAllocator::new();
    units.bind(&ContextBinding::new(MockContext::new("", "2.0").into_rc()));
    units
}

fn settings(maximum_number_of_peels: u32) -> PeelingSettings {
    PeelingSettings {
        maximum_number_of_peels,
        ..Default::default()
    }
}

#[test]
fn support_requires_every_token() {
    let mut controller = DepthPeelingController::default();
    assert!(controller.is_depth_peeling_supported(&FixedCapabilities::new(PEELING_TOKENS)));

    let mut controller = DepthPeelingController::default();
    assert!(!controller.is_depth_peeling_supported(&FixedCapabilities::new(&["GL_ARB_shadow"])));

    let mut unbound = FixedCapabilities::new(PEELING_TOKENS);
    unbound.generation = None;
    assert!(!DepthPeelingController::default().is_depth_peeling_supported(&unbound));
}

#[test]
fn support_is_probed_once_per_generation() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();

    for _ in 0..3 {
        let mut scene = MockScene::with_translucent(1);
        let mut target = MockTarget::new(vec![50]);
        controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);
    }
    assert_eq!(caps.lookups.get(), 2);

    let next = FixedCapabilities::new(PEELING_TOKENS);
    assert!(controller.is_depth_peeling_supported(&next));
    assert_eq!(next.lookups.get(), 2);

    controller.set_settings(PeelingSettings::default());
    assert!(controller.is_depth_peeling_supported(&next));
    assert_eq!(next.lookups.get(), 4);
}

#[test]
fn exhaustion_mid_loop_keeps_the_captured_layers() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::new(settings(6));
    let mut units = units();
    let mut scene = MockScene::with_translucent(3);
    let mut target = MockTarget::new(vec![900, 400, 200, 100, 50, 25]);
    target.exhausted_at = Some(2);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 2);
    assert_eq!(report.termination, Some(PeelTermination::OutOfResources));
    assert_eq!(report.mode, PeelMode::Peeled);
    assert_eq!(controller.state(), PeelingState::Done);
    assert_eq!(scene.peeled_passes, vec![0, 1]);
    assert_eq!(scene.plain_passes, 0);
    assert_eq!(
        target.events,
        vec![
            TargetEvent::BeginPeeling,
            TargetEvent::BeginLayer(0),
            TargetEvent::EndLayer(0),
            TargetEvent::BeginLayer(1),
            TargetEvent::EndLayer(1),
            TargetEvent::BeginLayer(2),
            TargetEvent::Composite(vec![LayerHandle(100), LayerHandle(101)]),
            TargetEvent::EndPeeling,
        ]
    );
    assert_eq!(units.free_units(), units.number_of_units());
}

#[test]
fn peeling_stops_at_the_layer_limit() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::new(settings(3));
    let mut units = units();
    let mut scene = MockScene::with_translucent(5);
    let mut target = MockTarget::new(vec![100; 10]);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 3);
    assert_eq!(report.termination, Some(PeelTermination::LayerLimitReached));
    assert_eq!(scene.peeled_passes, vec![0, 1, 2]);
}

#[test]
fn zero_maximum_peels_until_a_layer_is_empty() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::new(settings(0));
    let mut units = units();
    let mut scene = MockScene::with_translucent(5);
    let mut target = MockTarget::new(vec![100; 7]);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 7);
    assert_eq!(report.termination, Some(PeelTermination::NoGeometryLeft));
    assert!(target.events.contains(&TargetEvent::DiscardLayer(7)));
}

#[test]
fn occlusion_threshold_ends_the_loop_after_a_sparse_layer() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::new(PeelingSettings {
        maximum_number_of_peels: 0,
        occlusion_ratio: 0.01,
        ..Default::default()
    });
    let mut units = units();
    let mut scene = MockScene::with_translucent(2);
    // 1% of a 100x100 viewport is 100 fragments.
    let mut target = MockTarget::new(vec![5000, 800, 100, 60]);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 3);
    assert_eq!(report.termination, Some(PeelTermination::NoGeometryLeft));
}

#[test]
fn scene_without_translucent_geometry_uses_plain_blending() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    let mut scene = MockScene::with_translucent(0);
    let mut target = MockTarget::new(vec![]);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(
        report.mode,
        PeelMode::PlainBlending(PlainBlendingReason::NoTranslucentGeometry)
    );
    assert_eq!(report.layers_rendered, 0);
    assert_eq!(scene.opaque_passes, 1);
    assert_eq!(scene.plain_passes, 1);
    assert_eq!(target.events, vec![TargetEvent::BeginPlain, TargetEvent::EndPlain]);
}

#[test]
fn first_layer_drawing_no_props_is_discarded() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    // Everything translucent is culled once peeling starts.
    let mut scene = MockScene::with_translucent(3);
    scene.culled_when_peeling = true;
    let mut target = MockTarget::new(vec![100]);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 0);
    assert_eq!(report.termination, Some(PeelTermination::NoGeometryLeft));
    assert_eq!(
        target.events,
        vec![
            TargetEvent::BeginPeeling,
            TargetEvent::BeginLayer(0),
            TargetEvent::DiscardLayer(0),
            TargetEvent::Composite(vec![]),
            TargetEvent::EndPeeling,
        ]
    );
}

#[test]
fn empty_first_layer_terminates_with_no_geometry() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    let mut scene = MockScene::with_translucent(2);
    let mut target = MockTarget::new(vec![0]);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 0);
    assert_eq!(report.termination, Some(PeelTermination::NoGeometryLeft));
    assert_eq!(report.mode, PeelMode::Peeled);
    assert_eq!(
        target.events,
        vec![
            TargetEvent::BeginPeeling,
            TargetEvent::BeginLayer(0),
            TargetEvent::EndLayer(0),
            TargetEvent::DiscardLayer(0),
            TargetEvent::Composite(vec![]),
            TargetEvent::EndPeeling,
        ]
    );
}

#[test]
fn unsupported_context_falls_back_to_plain_blending() {
    let caps = FixedCapabilities::new(&["GL_ARB_depth_texture"]);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    let mut scene = MockScene::with_translucent(4);
    let mut target = MockTarget::new(vec![100]);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 0);
    assert_eq!(report.termination, None);
    assert_eq!(
        report.mode,
        PeelMode::PlainBlending(PlainBlendingReason::Unsupported)
    );
    assert_eq!(scene.opaque_passes, 1);
    assert_eq!(scene.plain_passes, 1);
    assert!(scene.peeled_passes.is_empty());
}

#[test]
fn exhaustion_before_any_layer_still_draws_translucent_geometry() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    let mut scene = MockScene::with_translucent(4);
    let mut target = MockTarget::new(vec![100]);
    target.exhausted_at = Some(0);

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.layers_rendered, 0);
    assert_eq!(report.termination, Some(PeelTermination::OutOfResources));
    assert_eq!(
        report.mode,
        PeelMode::PlainBlending(PlainBlendingReason::NoLayersComposited)
    );
    assert_eq!(scene.opaque_passes, 1);
    assert_eq!(scene.plain_passes, 1);
    assert_eq!(
        target.events,
        vec![
            TargetEvent::BeginPeeling,
            TargetEvent::BeginLayer(0),
            TargetEvent::Composite(vec![]),
            TargetEvent::EndPeeling,
            TargetEvent::BeginPlain,
            TargetEvent::EndPlain,
        ]
    );
}

#[test]
fn failed_opaque_capture_skips_the_loop() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    let mut scene = MockScene::with_translucent(4);
    let mut target = MockTarget::new(vec![100]);
    target.fail_begin_peeling = true;

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.termination, Some(PeelTermination::OutOfResources));
    assert_eq!(scene.plain_passes, 1);
    assert_eq!(
        target.events,
        vec![
            TargetEvent::BeginPeeling,
            TargetEvent::BeginPlain,
            TargetEvent::EndPlain,
        ]
    );
}

#[test]
fn texture_unit_shortage_is_an_out_of_resources_frame() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    let mut scene = MockScene::with_translucent(4);
    let mut target = MockTarget::new(vec![100]);
    target.units_needed = units.number_of_units() + 1;

    let report = controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut target);

    assert_eq!(report.termination, Some(PeelTermination::OutOfResources));
    assert_eq!(units.free_units(), units.number_of_units());
}

#[test]
fn context_state_wires_registry_units_and_controller() {
    let mut state = ContextState::new(
        BackendProfile::opengl(),
        SymbolResolver::none(),
        settings(2),
    );
    state.bind_context(MockContext::new("GL_ARB_depth_texture GL_ARB_shadow", "2.1").into_rc());
    assert!(state.is_depth_peeling_supported());

    let mut scene = MockScene::with_translucent(3);
    let mut target = MockTarget::new(vec![100, 100, 100]);
    let report = state.render_with_depth_peeling(&mut scene, &mut target);
    assert_eq!(report.layers_rendered, 2);
    assert_eq!(report.termination, Some(PeelTermination::LayerLimitReached));
    assert_eq!(state.texture_units().free_units(), 16);

    state.bind_context(MockContext::new("GL_ARB_shadow", "2.1").into_rc());
    assert!(!state.is_depth_peeling_supported());
}

#[test]
fn pool_from_shader_units_is_enough_to_peel_on_core_contexts() {
    let mut state = ContextState::new(
        BackendProfile::opengl(),
        SymbolResolver::none(),
        settings(4),
    );
    let mut context = MockContext::new("GL_ARB_depth_texture GL_ARB_shadow", "3.3");
    context.max_texture_units = None;
    context.max_combined_units = Some(32);
    state.bind_context(context.into_rc());

    let mut scene = MockScene::with_translucent(2);
    let mut target = MockTarget::new(vec![400, 300, 0]);
    target.units_needed = 3;
    let report = state.render_with_depth_peeling(&mut scene, &mut target);

    assert_eq!(report.mode, PeelMode::Peeled);
    assert_eq!(report.layers_rendered, 2);
    assert_eq!(report.termination, Some(PeelTermination::NoGeometryLeft));
    assert_eq!(state.texture_units().free_units(), 32);
}

#[test]
fn binding_another_context_returns_the_controller_to_idle() {
    let mut state = ContextState::new(
        BackendProfile::opengl(),
        SymbolResolver::none(),
        settings(2),
    );
    assert_eq!(state.peeling().state(), PeelingState::Idle);

    state.bind_context(MockContext::new("GL_ARB_depth_texture GL_ARB_shadow", "2.1").into_rc());
    let mut scene = MockScene::with_translucent(1);
    state.render_with_depth_peeling(&mut scene, &mut MockTarget::new(vec![50]));
    assert_eq!(state.peeling().state(), PeelingState::Done);

    state.bind_context(MockContext::new("GL_ARB_depth_texture GL_ARB_shadow", "2.1").into_rc());
    assert_eq!(state.peeling().state(), PeelingState::Idle);

    assert!(state.is_depth_peeling_supported());
    assert_eq!(state.peeling().state(), PeelingState::Probing);
    state.render_with_depth_peeling(&mut scene, &mut MockTarget::new(vec![50]));
    assert_eq!(state.peeling().state(), PeelingState::Done);

    state.unbind_context();
    assert_eq!(state.peeling().state(), PeelingState::Idle);
}

#[test]
fn cached_support_checks_leave_the_state_alone() {
    let caps = FixedCapabilities::new(PEELING_TOKENS);
    let mut controller = DepthPeelingController::default();
    let mut units = units();
    let mut scene = MockScene::with_translucent(1);

    controller.render_with_depth_peeling(&caps, &mut units, &mut scene, &mut MockTarget::new(vec![50]));
    assert_eq!(controller.state(), PeelingState::Done);
    assert!(controller.is_depth_peeling_supported(&caps));
    assert_eq!(controller.state(), PeelingState::Done);
    assert_eq!(caps.lookups.get(), 2);

    let other = FixedCapabilities::new(PEELING_TOKENS);
    controller.bind(other.generation.expect("generation"));
    assert_eq!(controller.state(), PeelingState::Idle);
    assert!(controller.is_depth_peeling_supported(&other));
    assert_eq!(controller.state(), PeelingState::Probing);
}
