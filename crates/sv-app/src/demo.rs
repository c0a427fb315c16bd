//! Demo session: a calibrated time-lapse stack next to a mesh

use std::sync::Arc;

use anyhow::Result;
use glam::Vec3;
use ndarray::{ArrayD, IxDyn};
use tracing::{info, warn};

use sv_core::events::events::{ActiveAxisChanged, PositionChanged, ViewFailed};
use sv_core::events::typed_handler;
use sv_core::{Axis, DisplayRegistry};
use sv_views::{Dataset, Mesh};

/// Synthetic stack of shape `[x, y, z, t]` with a bright blob drifting in Z
fn time_lapse(x: usize, y: usize, z: usize, t: usize) -> ArrayD<f32> {
    ArrayD::from_shape_fn(IxDyn(&[x, y, z, t]), |index| {
        let (xi, yi, zi, ti) = (index[0] as f32, index[1] as f32, index[2] as f32, index[3] as f32);
        let dz = zi - ti;
        let dx = xi - x as f32 / 2.0;
        let dy = yi - y as f32 / 2.0;
        (-(dx * dx + dy * dy + dz * dz) / 8.0).exp()
    })
}

pub async fn run(registry: Arc<DisplayRegistry>) -> Result<()> {
    let events = registry.events().clone();
    events.subscribe::<PositionChanged>(typed_handler(|event: &PositionChanged| {
        info!("{}: position changed on {}", event.display, event.axis);
    }));
    events.subscribe::<ActiveAxisChanged>(typed_handler(|event: &ActiveAxisChanged| {
        info!("{}: active axis is now {}", event.display, event.axis);
    }));
    events.subscribe::<ViewFailed>(typed_handler(|event: &ViewFailed| {
        warn!("{}: {} failed: {}", event.display, event.view, event.message);
    }));

    let stack = Dataset::new(
        "cells",
        time_lapse(32, 32, 12, 6),
        vec![Axis::X, Axis::Y, Axis::Z, Axis::Time],
    )?;
    stack.set_calibration(&Axis::Z, 0.0, 0.5)?;
    let mesh = Mesh::cuboid("nucleus", Vec3::new(8.0, 8.0, 2.0), Vec3::new(20.0, 20.0, 4.0))?;

    let primary = registry.create_display();
    primary.display_item(stack.clone())?;
    primary.display_item(mesh.clone())?;
    let name = primary.name().unwrap_or_default();
    info!("Display '{}' axes: {:?}", name, primary.axes());

    // Walk through Z, then step in time. Position events arrive on the
    // registry's worker.
    for _ in 0..4 {
        primary.next(&Axis::Z)?;
        primary.update();
        let z = primary.position(&Axis::Z);
        let visible = primary.visible_views().len();
        info!("Z = {}, visible views: {}", z, visible);
    }
    primary.set_active_axis(Axis::Time)?;
    primary.advance(&Axis::Time, 3)?;
    primary.update();
    if let Some(t) = registry.active_position(&Axis::Time) {
        info!("Active display is at T = {}", t);
    }

    // A second display for the same item gets a distinct name
    let second = registry.create_display();
    second.display_item(stack.clone())?;
    info!("Second display is named '{}'", second.name().unwrap_or_default());

    // Content change: handled inline
    let event = stack.crop(&Axis::Z, 2..10)?;
    for handle in registry.notify_item(event) {
        handle.await?;
    }

    // Shape change: handled on the worker
    let volume = time_lapse(32, 32, 12, 1).into_shape(IxDyn(&[32, 32, 12]))?;
    let event = stack.replace_data(volume, vec![Axis::X, Axis::Y, Axis::Z])?;
    for handle in registry.notify_item(event) {
        handle.await?;
    }

    for shown in registry.displays() {
        info!("{}", serde_json::to_string_pretty(&shown.snapshot())?);
    }
    Ok(())
}
