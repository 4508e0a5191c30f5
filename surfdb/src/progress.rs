/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines progress reporting messages, sinks, and helper functions for RBF construction.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Progress reporting primitives for RBF construction and regularization.

use std::fmt::Debug;
use std::sync::{mpsc, Arc};
use std::thread;

/// Progress events emitted while interpolants are being built.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMsg {
    /// An interpolant is being fitted for `col`, optionally for one slice.
    RbfFit {
        col: String,
        args: Vec<String>,
        slice: Option<usize>,
        num_slices: usize,
        num_points: usize,
    },

    /// A regularized column is being evaluated on one slice of the grid.
    RegularizeSlice { col: String, slice: usize, num_slices: usize },

    /// Arbitrary informational message.
    Message { message: String },
}

impl ProgressMsg {
    /// One-line summary, e.g. `Creating RBF for CN(mach=0.8,alpha,beta)`.
    pub fn describe(&self) -> String {
        match self {
            ProgressMsg::RbfFit { col, args, .. } => {
                format!("Creating RBF for {}({})", col, args.join(","))
            }
            ProgressMsg::RegularizeSlice { col, slice, num_slices } => {
                format!("Interpolating '{}' slice {}/{}", col, slice + 1, num_slices)
            }
            ProgressMsg::Message { message } => message.clone(),
        }
    }
}

/// Sink that consumes progress messages.
pub trait ProgressSink: Send + Sync + Debug {
    fn emit(&self, msg: ProgressMsg);
}

/// Progress sink that forwards messages over a channel.
#[derive(Debug)]
pub struct ClosureSink {
    tx: mpsc::SyncSender<ProgressMsg>,
}

impl ProgressSink for ClosureSink {
    #[inline]
    fn emit(&self, msg: ProgressMsg) {
        let _ = self.tx.try_send(msg);
    }
}

/// Spawns a listener thread that runs a handler closure for each progress message.
///
/// The thread exits once every clone of the returned sink has been dropped.
pub fn closure_sink<F>(
    buffer: usize,
    mut handler: F,
) -> (Arc<dyn ProgressSink>, thread::JoinHandle<()>)
where
    F: FnMut(ProgressMsg) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<ProgressMsg>(buffer.max(1));
    let sink: Arc<dyn ProgressSink> = Arc::new(ClosureSink { tx });

    let handle = thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            handler(msg);
        }
    });

    (sink, handle)
}

/// Emits `msg` if a sink is attached.
#[inline]
pub(crate) fn report(sink: &Option<Arc<dyn ProgressSink>>, msg: ProgressMsg) {
    if let Some(sink) = sink {
        sink.emit(msg);
    }
}
