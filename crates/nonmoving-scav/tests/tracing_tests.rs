//! Integration tests for the scavenger's tracing feature.
//!
//! A recording layer captures spans and events emitted while draining.

#![cfg(feature = "tracing")]

mod common;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use common::{cons, ModelEvacuator, ModelHeap};
use nonmoving_scav::{scavenge_nonmoving_heap, Closure, InfoTable, Layout, ScanContext};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{span, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

#[derive(Clone, Default)]
struct Recorded {
    spans: Arc<Mutex<Vec<String>>>,
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for Recorded {
    fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
        self.spans.lock().push(attrs.metadata().name().to_owned());
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = Message(String::new());
        event.record(&mut message);
        self.events.lock().push((*event.metadata().level(), message.0));
    }
}

impl Recorded {
    fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

fn with_recorder(f: impl FnOnce()) -> Recorded {
    let recorded = Recorded::default();
    let subscriber = tracing_subscriber::registry().with(recorded.clone());
    tracing::subscriber::with_default(subscriber, f);
    recorded
}

#[test]
fn test_drain_emits_span_and_events() {
    let heap = ModelHeap::new(1);
    let young = heap.young(0x100, cons(&[]));
    heap.old_segment(0x80_000, vec![cons(&[young.raw()])]);

    let recorded = with_recorder(|| {
        let mut evac = ModelEvacuator::new(&heap);
        let mut ctx = ScanContext::new(0);
        scavenge_nonmoving_heap(&heap.gen, &mut evac, &mut ctx);
    });

    assert_eq!(*recorded.spans.lock(), vec!["scavenge_nonmoving_heap"]);
    let messages = recorded.messages();
    assert_eq!(messages.iter().filter(|m| *m == "scavenge_pass").count(), 3);
    assert!(messages.iter().any(|m| m == "scavenge_segment"));
    assert!(messages.iter().any(|m| m == "scavenge_large_object"));
    assert_eq!(messages.last().map(String::as_str), Some("scavenge_done"));
}

#[test]
fn test_record_mutable_event() {
    let heap = ModelHeap::new(1);
    let stuck = heap.stick(0x300);
    heap.old_segment(0x80_000, vec![cons(&[stuck.raw()])]);

    let recorded = with_recorder(|| {
        let mut evac = ModelEvacuator::new(&heap);
        let mut ctx = ScanContext::new(0);
        scavenge_nonmoving_heap(&heap.gen, &mut evac, &mut ctx);
    });

    assert!(recorded.messages().iter().any(|m| m == "record_mutable"));
}

#[test]
fn test_fatal_diagnostic_logged_at_error() {
    let heap = ModelHeap::new(1);
    heap.old_large_object(
        0x90_000,
        Closure::from_parts(InfoTable::from_raw(300, Layout::new(0, 0)), vec![]),
    );

    let recorded = with_recorder(|| {
        let mut evac = ModelEvacuator::new(&heap);
        let mut ctx = ScanContext::new(0);
        let result = catch_unwind(AssertUnwindSafe(|| {
            scavenge_nonmoving_heap(&heap.gen, &mut evac, &mut ctx);
        }));
        assert!(result.is_err());
    });

    let events = recorded.events.lock();
    assert!(events
        .iter()
        .any(|(level, m)| *level == Level::ERROR && m == "heap_corruption"));
}
