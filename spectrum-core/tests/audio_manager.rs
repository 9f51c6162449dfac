mod support;

use spectrum_core::{AudioConfig, AudioManager, CaptureSettings, SpectrumScale, WindowType};
use support::{init_logging, ScriptedBackend};

fn manager(backend: &ScriptedBackend) -> AudioManager {
    init_logging();
    let config = AudioConfig {
        capture: CaptureSettings::immediate(),
        ..AudioConfig::default()
    };
    let mut manager = AudioManager::new(backend.shared(), config);
    manager.initialize().unwrap();
    manager
}

#[test]
fn bar_count_steps_and_clamps() {
    let backend = ScriptedBackend::new();
    let mut manager = manager(&backend);
    assert_eq!(manager.bar_count(), 64);

    manager.change_bar_count(4);
    assert_eq!(manager.bar_count(), 68);

    for _ in 0..100 {
        manager.change_bar_count(-4);
    }
    assert_eq!(manager.bar_count(), 16);

    for _ in 0..100 {
        manager.change_bar_count(4);
    }
    assert_eq!(manager.bar_count(), 256);
    assert_eq!(manager.spectrum().len(), 256);

    manager.toggle_animation();
    manager.update(0.016);
    assert_eq!(manager.spectrum().len(), 256);
}

#[test]
fn amplification_is_clamped() {
    let backend = ScriptedBackend::new();
    let mut manager = manager(&backend);

    for _ in 0..100 {
        manager.change_amplification(0.1);
    }
    assert_eq!(manager.amplification(), 5.0);
    assert_eq!(manager.realtime().analyzer().amplification(), 5.0);

    for _ in 0..100 {
        manager.change_amplification(-0.1);
    }
    assert!((manager.amplification() - 0.1).abs() < 1e-6);
}

#[test]
fn window_and_scale_cycle() {
    let backend = ScriptedBackend::new();
    let mut manager = manager(&backend);
    assert_eq!(manager.window(), WindowType::Hann);
    assert_eq!(manager.scale(), SpectrumScale::Logarithmic);

    manager.change_fft_window(1);
    assert_eq!(manager.window(), WindowType::Hamming);
    manager.change_fft_window(-2);
    assert_eq!(manager.window(), WindowType::Rectangular);
    assert_eq!(
        manager.realtime().analyzer().window(),
        WindowType::Rectangular
    );

    manager.change_spectrum_scale(1);
    assert_eq!(manager.scale(), SpectrumScale::Mel);
    manager.change_spectrum_scale(1);
    assert_eq!(manager.scale(), SpectrumScale::Linear);
    assert_eq!(manager.realtime().analyzer().scale(), SpectrumScale::Linear);
}

#[test]
fn animation_takes_over_from_capture() {
    let backend = ScriptedBackend::new();
    let mut manager = manager(&backend);

    manager.toggle_capture();
    assert!(manager.is_capturing());

    manager.toggle_animation();
    assert!(manager.is_animating());
    assert!(!manager.is_capturing());

    // Capture toggles are ignored while animating.
    manager.toggle_capture();
    assert!(!manager.is_capturing());

    for _ in 0..20 {
        manager.update(1.0 / 60.0);
    }
    assert!(manager.spectrum().iter().any(|&v| v > 0.0));

    manager.toggle_animation();
    assert!(!manager.is_animating());
    manager.toggle_capture();
    assert!(manager.is_capturing());
    manager.toggle_capture();
    assert!(!manager.is_capturing());
}
