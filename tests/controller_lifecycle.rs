//! Controller registry and start/stop scenarios against the in-memory backend

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hotkey_toggle::{
    BehaviorOptions, Binding, BindingState, Controller, ControllerBehavior, ControllerPhase,
    HotkeyError, HotkeyEvent, VirtualBackend,
};

fn counting(chord: &str) -> (Binding, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let on = Arc::new(AtomicUsize::new(0));
    let off = Arc::new(AtomicUsize::new(0));
    let binding = {
        let on = Arc::clone(&on);
        let off = Arc::clone(&off);
        Binding::with_deactivate(
            chord,
            move || {
                on.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            move || {
                off.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap()
    };
    (binding, on, off)
}

fn noop(chord: &str) -> Binding {
    Binding::new(chord, || Ok(())).unwrap()
}

#[test]
fn test_duplicate_registration_rejected() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("alt+1"), false).unwrap();

    let err = controller.register(noop("alt+1"), false).unwrap_err();
    assert!(matches!(err, HotkeyError::DuplicateBinding(ref chord) if chord == "alt+1"));
    assert_eq!(controller.len(), 1);
}

#[test]
fn test_overwrite_unhooks_previous_binding() {
    let controller = Controller::with_behavior(
        VirtualBackend::new(),
        ControllerBehavior {
            allow_overwrite: true,
            log_debug: true,
        },
    );
    let (first, first_on, _) = counting("alt+1");
    let (second, second_on, _) = counting("alt+1");

    controller.register(first, true).unwrap();
    controller.register(second, false).unwrap();

    let backend = controller.backend();
    assert_eq!(backend.unhook_count("alt+1"), 1);
    assert!(!backend.is_hooked("alt+1"));
    assert!(!controller.is_listening("alt+1"));

    controller.start_listener("alt+1").unwrap();
    backend.fire("alt+1").unwrap().unwrap();
    assert_eq!(first_on.load(Ordering::SeqCst), 0);
    assert_eq!(second_on.load(Ordering::SeqCst), 1);
}

#[test]
fn test_start_listener_requires_registration() {
    let controller = Controller::new(VirtualBackend::new());
    let err = controller.start_listener("alt+9").unwrap_err();
    assert!(matches!(err, HotkeyError::UnknownBinding(_)));
    assert!(controller.listening_chords().is_empty());
}

#[test]
fn test_start_listener_is_idempotent() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("alt+1"), true).unwrap();
    controller.start_listener("alt+1").unwrap();
    controller.start_all_listeners().unwrap();

    assert_eq!(controller.backend().hook_count("alt+1"), 1);
}

#[test]
fn test_failed_hook_leaves_binding_inactive() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("+"), false).unwrap();

    let err = controller.start_listener("+").unwrap_err();
    assert!(matches!(err, HotkeyError::Backend(_)));
    assert!(!controller.is_listening("+"));
    assert!(controller.is_registered("+"));
}

#[test]
fn test_fire_toggles_registered_binding() {
    let controller = Controller::new(VirtualBackend::new());
    let (binding, on, off) = counting("alt+1");
    controller.register(binding, true).unwrap();
    let mut events = controller.subscribe();

    let backend = controller.backend();
    backend.fire("alt+1").unwrap().unwrap();
    assert_eq!(controller.state_of("alt+1"), Some(BindingState::Active));
    assert_eq!(on.load(Ordering::SeqCst), 1);
    assert_eq!(off.load(Ordering::SeqCst), 0);

    backend.fire("alt+1").unwrap().unwrap();
    assert_eq!(controller.state_of("alt+1"), Some(BindingState::Disabled));
    assert_eq!(off.load(Ordering::SeqCst), 1);

    assert_eq!(
        events.try_recv().unwrap(),
        HotkeyEvent::Toggled {
            chord: "alt+1".into(),
            state: BindingState::Active
        }
    );
}

#[test]
fn test_failing_action_reaches_dispatcher() {
    let controller = Controller::new(VirtualBackend::new());
    let broken = Binding::new("alt+2", || anyhow::bail!("no device")).unwrap();
    let (healthy, healthy_on, _) = counting("alt+3");
    controller.register(broken, true).unwrap();
    controller.register(healthy, true).unwrap();

    let backend = controller.backend();
    let err = backend.fire("alt+2").unwrap().unwrap_err();
    assert!(matches!(err, HotkeyError::Action { .. }));
    assert_eq!(controller.state_of("alt+2"), Some(BindingState::Disabled));

    backend.fire("alt+3").unwrap().unwrap();
    assert_eq!(controller.state_of("alt+3"), Some(BindingState::Active));
    assert_eq!(healthy_on.load(Ordering::SeqCst), 1);
}

#[test]
fn test_start_all_then_cleanup() {
    let controller = Controller::with_bindings(
        VirtualBackend::new(),
        ControllerBehavior::default(),
        vec![noop("alt+1"), noop("alt+2")],
    )
    .unwrap();
    assert_eq!(controller.phase(), ControllerPhase::Created);

    controller.start_all_listeners().unwrap();
    assert_eq!(controller.phase(), ControllerPhase::Listening);
    assert_eq!(controller.listening_chords(), vec!["alt+1", "alt+2"]);

    controller.cleanup().unwrap();

    let backend = controller.backend();
    assert!(controller.listening_chords().is_empty());
    assert_eq!(backend.unhook_count("alt+1"), 1);
    assert_eq!(backend.unhook_count("alt+2"), 1);
    assert!(backend.hooked_chords().is_empty());
    assert!(controller.stop_signal().is_set());
    assert_eq!(controller.phase(), ControllerPhase::Stopped);
    assert_eq!(controller.len(), 2);
}

#[test]
fn test_cleanup_skips_deactivate() {
    let controller = Controller::new(VirtualBackend::new());
    let (binding, _, off) = counting("alt+1");
    controller.register(binding, true).unwrap();
    controller.backend().fire("alt+1").unwrap().unwrap();

    controller.cleanup().unwrap();
    assert_eq!(off.load(Ordering::SeqCst), 0);
    assert_eq!(controller.state_of("alt+1"), Some(BindingState::Active));
}

#[test]
fn test_cleanup_halts_repeat_tasks() {
    let controller = Controller::new(VirtualBackend::new());
    let (binding, on, off) = counting("alt+r");
    let binding = binding.with_options(BehaviorOptions::default().repeat_every(Duration::from_millis(10)));
    controller.register(binding, true).unwrap();

    controller.backend().fire("alt+r").unwrap().unwrap();
    thread::sleep(Duration::from_millis(40));
    controller.cleanup().unwrap();

    let after = on.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(on.load(Ordering::SeqCst), after);
    assert_eq!(off.load(Ordering::SeqCst), 0);
    assert_eq!(controller.state_of("alt+r"), Some(BindingState::Disabled));
}

#[test]
fn test_wait_returns_after_stop_chord() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("alt+1"), false).unwrap();
    controller.register(noop("alt+2"), false).unwrap();
    controller.start_all_listeners().unwrap();

    let waiter = {
        let controller = controller.clone();
        thread::spawn(move || controller.wait("ctrl+f12"))
    };

    let backend = Arc::clone(controller.backend());
    while !backend.is_hooked("ctrl+f12") {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(controller.stop_chord().as_deref(), Some("ctrl+f12"));

    backend.fire("ctrl+f12").unwrap().unwrap();
    waiter.join().unwrap().unwrap();

    assert!(backend.hooked_chords().is_empty());
    assert_eq!(backend.unhook_count("alt+1"), 1);
    assert_eq!(backend.unhook_count("alt+2"), 1);
    assert_eq!(backend.unhook_count("ctrl+f12"), 1);
    assert_eq!(controller.stop_chord(), None);
}

#[test]
fn test_stop_signal_from_code_releases_listeners() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("alt+1"), true).unwrap();

    let waiter = {
        let controller = controller.clone();
        thread::spawn(move || controller.wait("ctrl+f12"))
    };

    let backend = Arc::clone(controller.backend());
    while !backend.is_hooked("ctrl+f12") {
        thread::sleep(Duration::from_millis(5));
    }

    controller.stop_signal().trigger();
    waiter.join().unwrap().unwrap();

    assert!(backend.hooked_chords().is_empty());
    assert!(controller.listening_chords().is_empty());
}

#[test]
fn test_wait_rejects_blank_stop_chord() {
    let controller = Controller::new(VirtualBackend::new());
    assert!(matches!(
        controller.wait(" "),
        Err(HotkeyError::InvalidChord(_))
    ));
}

#[test]
fn test_unregister_removes_binding() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("alt+1"), true).unwrap();

    controller.unregister("alt+1").unwrap();
    assert!(!controller.is_registered("alt+1"));
    assert!(!controller.backend().is_hooked("alt+1"));
    assert!(matches!(
        controller.unregister("alt+1"),
        Err(HotkeyError::UnknownBinding(_))
    ));
}

#[test]
fn test_wait_for_release_through_backend() {
    let controller = Controller::new(VirtualBackend::new());
    let (binding, on, _) = counting("alt+c");
    let binding = binding.with_options(BehaviorOptions::default().wait_for_release(true));
    controller.register(binding, true).unwrap();

    let backend = Arc::clone(controller.backend());
    let dispatch = backend.press("alt+c").unwrap();

    thread::sleep(Duration::from_millis(40));
    assert_eq!(on.load(Ordering::SeqCst), 0);
    let busy = controller.snapshot();
    assert_eq!(busy[0].state, None);

    backend.release("alt+c");
    dispatch.join().unwrap().unwrap();
    assert_eq!(on.load(Ordering::SeqCst), 1);
    assert_eq!(controller.state_of("alt+c"), Some(BindingState::Active));
}

#[test]
fn test_restart_after_cleanup_is_listening() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("alt+1"), true).unwrap();

    controller.cleanup().unwrap();
    assert_eq!(controller.phase(), ControllerPhase::Stopped);

    controller.start_all_listeners().unwrap();
    assert_eq!(controller.phase(), ControllerPhase::Listening);
    assert!(!controller.stop_signal().is_set());

    // Re-armed, so a second wait blocks until the next stop chord
    let waiter = {
        let controller = controller.clone();
        thread::spawn(move || controller.wait("ctrl+f12"))
    };
    let backend = Arc::clone(controller.backend());
    while !backend.is_hooked("ctrl+f12") {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(backend.is_hooked("alt+1"));

    backend.fire("ctrl+f12").unwrap().unwrap();
    waiter.join().unwrap().unwrap();
    assert_eq!(controller.phase(), ControllerPhase::Stopped);
    assert_eq!(backend.unhook_count("alt+1"), 2);
}

#[test]
fn test_panicking_action_leaves_dispatch_working() {
    let controller = Controller::new(VirtualBackend::new());
    let panicked = Arc::new(AtomicBool::new(false));
    let flaky = {
        let panicked = Arc::clone(&panicked);
        Binding::new("alt+p", move || {
            if !panicked.swap(true, Ordering::SeqCst) {
                panic!("driver crashed");
            }
            Ok(())
        })
        .unwrap()
    };
    let (healthy, healthy_on, _) = counting("alt+3");
    controller.register(flaky, true).unwrap();
    controller.register(healthy, true).unwrap();

    let backend = Arc::clone(controller.backend());
    let dispatch = backend.press("alt+p").unwrap();
    assert!(dispatch.join().is_err());
    backend.release("alt+p");

    backend.fire("alt+p").unwrap().unwrap();
    assert_eq!(controller.state_of("alt+p"), Some(BindingState::Active));

    backend.fire("alt+3").unwrap().unwrap();
    assert_eq!(controller.state_of("alt+3"), Some(BindingState::Active));
    assert_eq!(healthy_on.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_from_code_emits_stopped() {
    let controller = Controller::new(VirtualBackend::new());
    controller.register(noop("alt+1"), true).unwrap();
    let mut events = controller.subscribe();

    let waiter = {
        let controller = controller.clone();
        thread::spawn(move || controller.wait("ctrl+f12"))
    };
    let backend = Arc::clone(controller.backend());
    while !backend.is_hooked("ctrl+f12") {
        thread::sleep(Duration::from_millis(5));
    }

    controller.stop_signal().trigger();
    waiter.join().unwrap().unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&HotkeyEvent::ListenerStopped {
        chord: "alt+1".to_owned()
    }));
    assert!(seen.contains(&HotkeyEvent::Stopped));
}

#[test]
fn test_action_can_unregister_itself() {
    let controller = Controller::new(VirtualBackend::new());
    let handle: Arc<Mutex<Option<Controller<VirtualBackend>>>> = Arc::new(Mutex::new(None));
    let binding = {
        let handle = Arc::clone(&handle);
        Binding::new("alt+u", move || {
            let controller = handle.lock().unwrap().clone();
            if let Some(controller) = controller {
                controller.unregister("alt+u")?;
            }
            Ok(())
        })
        .unwrap()
    };
    controller.register(binding, true).unwrap();
    *handle.lock().unwrap() = Some(controller.clone());

    let backend = Arc::clone(controller.backend());
    let dispatch = backend.press("alt+u").unwrap();
    dispatch.join().unwrap().unwrap();
    backend.release("alt+u");

    assert!(!controller.is_registered("alt+u"));
    assert!(!backend.is_hooked("alt+u"));

    // Break the controller -> binding -> controller cycle
    handle.lock().unwrap().take();
}
