//! Format negotiation, physical-source routing and sample-tap tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;

use media_capture_core::routing::{ConnectorKind, PhysicalSourceInfo, RelatedPins};
use media_capture_core::{
    CaptureError, DeviceReference, GraphController, GraphDriver, GraphState, NodeId,
    PreviewSurface,
};
use media_capture_sim::{SimCatalog, SimClock, SimDeviceSpec, SimDriver};

fn catalog_with_cam_and_mic() -> (SimCatalog, DeviceReference, DeviceReference) {
    let catalog = SimCatalog::new();
    let cam = catalog.add(SimDeviceSpec::video("cam0", "Sim Camera"));
    let mic = catalog.add(SimDeviceSpec::audio("mic0", "Sim Microphone"));
    (catalog, cam, mic)
}

// --- Format negotiation ---

#[test]
fn frame_rate_is_clamped_to_the_nearest_supported_step() {
    let (catalog, cam, _) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();

    let accepted = controller.set_frame_rate(23.0).unwrap();
    assert_relative_eq!(accepted, 25.0);
    assert_relative_eq!(controller.frame_rate().unwrap(), 25.0);
}

#[test]
fn format_access_survives_a_rendered_preview() {
    let (catalog, cam, _) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let probe = driver.clone();
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();
    controller
        .set_preview_surface(Some(PreviewSurface::from_raw(9)))
        .unwrap();

    // Negotiation de-renders the graph, applies the change against the
    // disconnected endpoint, and restores the preview afterwards.
    let (width, height) = controller.set_frame_size(500, 500).unwrap();
    assert_eq!((width, height), (480, 480));

    assert_eq!(controller.state(), GraphState::Rendered);
    assert!(controller.diagnostics().preview_rendered);
    assert!(probe.preview_attached());
    assert_eq!(probe.clock(), SimClock::Running);
}

#[test]
fn audio_fields_clamp_and_round_trip() {
    let (catalog, _, mic) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, None, Some(mic)).unwrap();

    assert_eq!(controller.set_audio_sample_rate(20_000).unwrap(), 22_050);
    assert_eq!(controller.audio_sample_rate().unwrap(), 22_050);
    assert_eq!(controller.set_audio_channels(5).unwrap(), 2);
    assert_eq!(controller.set_audio_sample_size(12).unwrap(), 16);
}

#[test]
fn far_out_of_range_channel_request_clamps_cleanly() {
    let (catalog, _, mic) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, None, Some(mic)).unwrap();

    // Large enough that the derived wave fields would overflow their
    // types if computed naively before the driver clamps.
    assert_eq!(controller.set_audio_channels(5_000).unwrap(), 2);
    assert_eq!(controller.audio_channels().unwrap(), 2);
    assert_eq!(controller.state(), GraphState::Created);
}

#[test]
fn video_fields_need_a_video_device() {
    let (catalog, _, mic) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, None, Some(mic)).unwrap();

    assert!(matches!(
        controller.frame_rate(),
        Err(CaptureError::UnsupportedCapability(_))
    ));
    assert!(matches!(
        controller.video_caps(),
        Err(CaptureError::UnsupportedCapability(_))
    ));
}

#[test]
fn format_access_is_rejected_while_capturing() {
    let (catalog, cam, mic) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, Some(cam), Some(mic)).unwrap();
    controller.start().unwrap();

    assert!(matches!(
        controller.set_frame_rate(10.0),
        Err(CaptureError::InvalidState { .. })
    ));
    assert!(matches!(
        controller.audio_sample_rate(),
        Err(CaptureError::InvalidState { .. })
    ));
    controller.stop();
}

#[test]
fn capability_queries_reflect_the_catalog() {
    let (catalog, cam, mic) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, Some(cam), Some(mic)).unwrap();

    let video = controller.video_caps().unwrap();
    assert_relative_eq!(video.max_frame_rate, 30.0);
    assert_eq!(video.max_width, 640);

    let audio = controller.audio_caps().unwrap();
    assert_eq!(audio.maximum_sampling_rate, 44_100);
    assert_eq!(audio.minimum_channels, 1);
}

#[test]
fn compressor_change_resets_negotiated_formats() {
    let (catalog, cam, mic) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let probe = driver.clone();
    let mut controller = GraphController::new(driver, Some(cam), Some(mic)).unwrap();

    assert_eq!(controller.set_audio_sample_rate(11_025).unwrap(), 11_025);

    // The rebuild recreates every source node, so formats are back at the
    // device defaults and must be re-applied.
    let encoder = DeviceReference::new("enc0", "Sim Encoder");
    controller.set_video_compressor(Some(encoder)).unwrap();
    assert_eq!(controller.audio_sample_rate().unwrap(), 44_100);

    // The compressor sits between the video source and the mux.
    controller.start().unwrap();
    assert_eq!(probe.node_count(), 5);
    assert_eq!(probe.connection_count(), 4);
    controller.stop();
}

// --- Physical source routing ---

fn crossbar_cam() -> SimDeviceSpec {
    SimDeviceSpec::video("tuner0", "Sim Tuner Card").with_connectors(vec![
        PhysicalSourceInfo::Crossbar {
            connector: ConnectorKind::VideoComposite,
            output_pin: 0,
            input_pin: 1,
            related: Some(RelatedPins {
                output_pin: 1,
                input_pin: 4,
            }),
        },
        PhysicalSourceInfo::Crossbar {
            connector: ConnectorKind::VideoSvideo,
            output_pin: 0,
            input_pin: 2,
            related: None,
        },
    ])
}

#[test]
fn crossbar_sources_list_select_and_mute() {
    let catalog = SimCatalog::new();
    let cam = catalog.add(crossbar_cam());
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();

    assert_eq!(
        controller.video_source_names().unwrap(),
        vec!["Video Composite".to_string(), "Video S-Video".to_string()]
    );
    assert_eq!(controller.current_video_source().unwrap(), None);

    controller.select_video_source(Some(1)).unwrap();
    assert_eq!(controller.current_video_source().unwrap(), Some(1));

    // Crossbar routing switches atomically; no explicit disable needed.
    controller.select_video_source(Some(0)).unwrap();
    assert_eq!(controller.current_video_source().unwrap(), Some(0));

    controller.select_video_source(None).unwrap();
    assert_eq!(controller.current_video_source().unwrap(), None);

    assert!(matches!(
        controller.select_video_source(Some(7)),
        Err(CaptureError::UnsupportedCapability(_))
    ));
}

#[test]
fn related_crossbar_pins_follow_the_primary_route() {
    let catalog = SimCatalog::new();
    let cam = catalog.add(crossbar_cam());
    let driver = SimDriver::new(catalog);
    let probe = driver.clone();
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();

    controller.select_video_source(Some(0)).unwrap();
    // The composite input carries a related audio pin pair (1 <- 4).
    let mut raw = probe;
    let source = raw_source_node(&raw);
    assert_eq!(raw.routed_input(source, 0).unwrap(), Some(1));
    assert_eq!(raw.routed_input(source, 1).unwrap(), Some(4));

    controller.select_video_source(None).unwrap();
    assert_eq!(raw.routed_input(source, 0).unwrap(), None);
    assert_eq!(raw.routed_input(source, 1).unwrap(), None);
}

/// The single source node a fresh one-device controller creates.
fn raw_source_node(driver: &SimDriver) -> NodeId {
    assert_eq!(driver.node_count(), 1);
    NodeId::from_raw(1)
}

#[test]
fn mixer_sources_are_mutually_exclusive() {
    let catalog = SimCatalog::new();
    let mic = catalog.add(SimDeviceSpec::audio("mix0", "Sim Mixer").with_connectors(vec![
        PhysicalSourceInfo::MixerPin {
            pin: 0,
            name: "Mic".into(),
        },
        PhysicalSourceInfo::MixerPin {
            pin: 1,
            name: "Line In".into(),
        },
    ]));
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, None, Some(mic)).unwrap();

    assert_eq!(
        controller.audio_source_names().unwrap(),
        vec!["Mic".to_string(), "Line In".to_string()]
    );

    controller.select_audio_source(Some(0)).unwrap();
    assert_eq!(controller.current_audio_source().unwrap(), Some(0));

    // Enabling another pin disables the first; only one stays active.
    controller.select_audio_source(Some(1)).unwrap();
    assert_eq!(controller.current_audio_source().unwrap(), Some(1));

    controller.select_audio_source(None).unwrap();
    assert_eq!(controller.current_audio_source().unwrap(), None);
}

#[test]
fn plain_devices_report_no_sources() {
    let (catalog, cam, _) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();

    assert!(controller.video_source_names().unwrap().is_empty());
    assert_eq!(controller.current_video_source().unwrap(), None);
    controller.select_video_source(None).unwrap();
}

// --- Sample tap ---

#[test]
fn armed_tap_delivers_one_frame_per_arm() {
    let (catalog, cam, _) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let probe = driver.clone();
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();

    controller.enable_sample_tap(true);
    controller
        .set_preview_surface(Some(PreviewSurface::from_raw(5)))
        .unwrap();
    // source + tap + renderer
    assert_eq!(probe.node_count(), 3);

    let frames = Arc::new(AtomicUsize::new(0));
    let frames2 = Arc::clone(&frames);
    controller
        .arm_frame_grab(Arc::new(move |data, width, height| {
            assert_eq!((width, height), (640, 480));
            assert_eq!(data.len(), 640 * 480 * 3);
            frames2.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    assert!(probe.pump_preview_frame());
    assert_eq!(frames.load(Ordering::SeqCst), 1);

    // Further frames are dropped until the tap is re-armed.
    assert!(probe.pump_preview_frame());
    assert_eq!(frames.load(Ordering::SeqCst), 1);

    controller.rearm_frame_grab();
    assert!(probe.pump_preview_frame());
    assert_eq!(frames.load(Ordering::SeqCst), 2);

    controller.disarm_frame_grab();
    assert!(probe.pump_preview_frame());
    assert_eq!(frames.load(Ordering::SeqCst), 2);
}

#[test]
fn frames_can_be_pumped_from_another_thread() {
    let (catalog, cam, _) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let probe = driver.clone();
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();

    controller.enable_sample_tap(true);
    controller
        .set_preview_surface(Some(PreviewSurface::from_raw(8)))
        .unwrap();

    let frames = Arc::new(AtomicUsize::new(0));
    let frames2 = Arc::clone(&frames);
    controller
        .arm_frame_grab(Arc::new(move |_, _, _| {
            frames2.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    let pumper = probe.clone();
    let delivered = std::thread::spawn(move || pumper.pump_preview_frame())
        .join()
        .unwrap();
    assert!(delivered);
    assert_eq!(frames.load(Ordering::SeqCst), 1);
}

#[test]
fn tap_requires_a_rendered_preview_branch() {
    let (catalog, cam, _) = catalog_with_cam_and_mic();
    let driver = SimDriver::new(catalog);
    let mut controller = GraphController::new(driver, Some(cam), None).unwrap();

    controller.enable_sample_tap(true);
    // No preview branch yet, so there is no tap node to arm.
    assert!(matches!(
        controller.arm_frame_grab(Arc::new(|_, _, _| {})),
        Err(CaptureError::UnsupportedCapability(_))
    ));

    controller
        .set_preview_surface(Some(PreviewSurface::from_raw(6)))
        .unwrap();
    controller.arm_frame_grab(Arc::new(|_, _, _| {})).unwrap();

    // Tearing the preview down disarms and removes the tap.
    controller.set_preview_surface(None).unwrap();
    assert!(matches!(
        controller.arm_frame_grab(Arc::new(|_, _, _| {})),
        Err(CaptureError::UnsupportedCapability(_))
    ));
}
