/// Names a slice of session state; tickets carry it so a ticket can only be
/// checked against the counter it was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Slice {
    Model,
    Image,
    Layers,
    Selection,
    Attribution,
}

/// Proof of issue for one request: the slice and the counter value at the
/// moment the request was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    slice: Slice,
    seq: u64,
}

impl Ticket {
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

/// Monotonic request counter for one slice.
///
/// Only the holder of the most recently issued ticket may commit. `invalidate`
/// advances the counter without handing out a ticket, which turns every
/// outstanding ticket stale.
#[derive(Debug, Clone)]
pub(crate) struct RequestSeq {
    slice: Slice,
    latest: u64,
}

impl RequestSeq {
    pub(crate) fn new(slice: Slice) -> Self {
        RequestSeq { slice, latest: 0 }
    }

    pub(crate) fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket { slice: self.slice, seq: self.latest }
    }

    pub(crate) fn invalidate(&mut self) {
        self.latest += 1;
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        debug_assert_eq!(ticket.slice, self.slice, "ticket checked against the wrong slice");
        ticket.slice == self.slice && ticket.seq == self.latest
    }
}

/// One counter per slice.
#[derive(Debug, Clone)]
pub(crate) struct SequenceBook {
    pub(crate) model: RequestSeq,
    pub(crate) image: RequestSeq,
    pub(crate) layers: RequestSeq,
    pub(crate) selection: RequestSeq,
    pub(crate) attribution: RequestSeq,
}

impl SequenceBook {
    pub(crate) fn new() -> Self {
        SequenceBook {
            model:       RequestSeq::new(Slice::Model),
            image:       RequestSeq::new(Slice::Image),
            layers:      RequestSeq::new(Slice::Layers),
            selection:   RequestSeq::new(Slice::Selection),
            attribution: RequestSeq::new(Slice::Attribution),
        }
    }

    /// A model change: everything computed against the old model is void.
    pub(crate) fn invalidate_model_dependents(&mut self) {
        self.image.invalidate();
        self.layers.invalidate();
        self.selection.invalidate();
        self.attribution.invalidate();
    }
}

impl Default for SequenceBook {
    fn default() -> Self {
        SequenceBook::new()
    }
}
