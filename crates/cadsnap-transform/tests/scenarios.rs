//! End-to-end snapping scenarios.

use std::f64::consts::FRAC_PI_2;

use glam::{DMat4, DVec2, DVec3};

use cadsnap_core::{
    ConstraintFlags, ObjectId, SnapElements, SnapItem, SnapItemKind, SnapSettings, SnapTarget, TransformAction,
    TransformKind,
};
use cadsnap_detect::{DetectContext, Detectable, Detector, Geometry, HelperRegistry, MeshData, SnapHelper, StaticScene};
use cadsnap_geom::geom3d::signed_angle_in_plane;
use cadsnap_geom::{Axis, Space, View};
use cadsnap_transform::{
    compute_delta, pivot_from_three_points, ContextOperation, EditTarget, Phase, SessionEvent, SnapContext,
    SnappingSession,
};

fn cube_scene(eye: DVec3, up: DVec3) -> StaticScene {
    let view = View::look_at(eye, DVec3::ZERO, up, 45.0, 800, 600);
    StaticScene::new(view).with_object(Detectable::new(
        ObjectId(1),
        DMat4::IDENTITY,
        Geometry::Mesh(MeshData::cube(2.0)),
    ))
}

fn started(kind: TransformKind, from: DVec3, to: DVec3, about: Space) -> TransformAction {
    let mut action = TransformAction::new();
    action.start(kind, about);
    action.snap_from = from;
    action.snap_to = to;
    action
}

#[test]
fn cube_corner_vertex_beats_edge_and_face() {
    let scene = cube_scene(DVec3::new(3.0, 4.0, 6.0), DVec3::Z);
    let corner = DVec3::new(1.0, 1.0, 1.0);
    let cursor = scene.view.project(corner).unwrap() + DVec2::new(1.0, -1.0);

    let settings = SnapSettings::default();
    let helpers = HelperRegistry::new();
    let elements = SnapElements::VERT | SnapElements::EDGE | SnapElements::FACE;
    let ctx = DetectContext::new(&scene, &settings, &helpers, elements, cursor);

    let mut detector = Detector::with_defaults(&settings);
    detector.start(&ctx);
    let best = detector.detect(&ctx).expect("a candidate near the corner");

    assert_eq!(best.kind, SnapItemKind::POINT);
    assert!(best.coord.distance(corner) < 1e-9);
    assert_eq!(best.target, SnapTarget::Object(ObjectId(1)));
}

#[test]
fn crossing_lines_intersect_at_the_crossing() {
    let mut context = SnapContext::new();
    context.select(SnapItem::line(
        DVec3::new(0.0, 0.0, 1.0),
        DVec3::new(4.0, 4.0, 1.0),
        0.4,
        SnapTarget::Object(ObjectId(1)),
    ));
    context.select(SnapItem::line(
        DVec3::new(0.0, 4.0, 1.0),
        DVec3::new(4.0, 0.0, 1.0),
        0.6,
        SnapTarget::Object(ObjectId(2)),
    ));

    let helper = context.evaluate(ContextOperation::Intersection).unwrap();
    let SnapHelper::Point { coord } = helper else {
        panic!("expected a point, got {helper:?}");
    };
    assert!(coord.distance(DVec3::new(2.0, 2.0, 1.0)) < 1e-9);
}

#[test]
fn move_along_x_discards_other_components() {
    let mut action = started(
        TransformKind::MOVE,
        DVec3::ZERO,
        DVec3::new(3.0, 4.0, 0.0),
        Space::WORLD,
    );
    action.constraint = ConstraintFlags::along(Axis::X);

    let delta = compute_delta(&action);
    assert!(delta.translation().distance(DVec3::new(3.0, 0.0, 0.0)) < 1e-12);
    assert!(delta.matrix.transform_vector3(DVec3::Y).distance(DVec3::Y) < 1e-12);
}

#[test]
fn quarter_turn_is_positive_half_pi() {
    let pivot = Space::from_origin(DVec3::new(1.0, 1.0, 0.0));
    let from = pivot.origin() + DVec3::X * 2.0;
    let to = pivot.origin() + DVec3::Y * 2.0;

    let angle = signed_angle_in_plane(from - pivot.origin(), to - pivot.origin(), DVec3::Z);
    assert!((angle - FRAC_PI_2).abs() < 1e-12);

    let delta = compute_delta(&started(TransformKind::ROTATE, from, to, pivot));
    let turned = delta.matrix.transform_point3(from) - pivot.origin();
    assert!((turned.y.atan2(turned.x) - FRAC_PI_2).abs() < 1e-12);
    assert!(delta.matrix.transform_point3(pivot.origin()).distance(pivot.origin()) < 1e-12);
}

#[test]
fn three_points_define_the_pivot() {
    let mut scene = cube_scene(DVec3::new(6.0, 5.0, 4.0), DVec3::Z);
    let p1 = DVec3::new(1.0, -1.0, 1.0);
    let p2 = DVec3::new(-1.0, 1.0, 1.0);
    let p3 = DVec3::new(1.0, 1.0, -1.0);
    let normal = (p2 - p1).cross(p3 - p1).normalize();

    let mut session =
        SnappingSession::new(SnapSettings::default(), HelperRegistry::new()).with_elements(SnapElements::VERT);
    let event = session
        .begin(&mut scene, EditTarget::Pivot, TransformKind::BY_3_POINTS, Space::WORLD)
        .unwrap();
    assert_eq!(event, SessionEvent::Started { phase: Phase::PickTo, depth: 1 });

    for (i, p) in [p1, p2, p3].into_iter().enumerate() {
        let cursor = scene.view.project(p).unwrap();
        let event = session.press(&mut scene, cursor, false).unwrap();
        if i < 2 {
            assert!(matches!(event, SessionEvent::StepApplied { step, .. } if step == i + 1), "{event:?}");
        } else {
            assert!(matches!(event, SessionEvent::Applied { depth: 0, .. }), "{event:?}");
        }
    }
    assert!(session.is_finished());

    let pivot = session.pivot();
    assert!(pivot.origin().distance(p1) < 1e-9);
    assert!(pivot.x().distance((p2 - p1).normalize()) < 1e-9);
    assert!(pivot.z().distance(normal) < 1e-9);
    assert!(pivot.to_local(p3).z.abs() < 1e-9);

    let direct = pivot_from_three_points(&Space::WORLD, p1, Some(p2), Some(p3)).unwrap();
    assert!(direct.matrix().abs_diff_eq(pivot.matrix(), 1e-9));
}
