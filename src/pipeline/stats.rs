// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// A consistent point-in-time view of the three counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Unique numbers accepted since the last report.
    pub window_unique: u64,
    /// Duplicate sightings since the last report.
    pub window_duplicates: u64,
    /// Distinct numbers ever logged; never reset.
    pub cumulative_unique: u64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Received {} unique numbers, {} duplicates. Unique total: {}",
            self.window_unique, self.window_duplicates, self.cumulative_unique
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    window_unique: u64,
    window_duplicates: u64,
    cumulative_unique: u64,
}

/// Shared throughput counters, safe under concurrent handlers and the
/// report ticker. One mutex covers all three so every snapshot reflects a
/// single point in time.
#[derive(Debug, Default)]
pub struct Statistics {
    counters: Mutex<Counters>,
}

impl Statistics {
    pub fn note_unique(&self) {
        let mut c = self.lock();
        c.window_unique += 1;
        c.cumulative_unique += 1;
    }

    pub fn note_duplicate(&self) {
        self.lock().window_duplicates += 1;
    }

    /// Snapshots the counters and zeroes the window. The cumulative count
    /// survives every reset.
    pub fn report_and_reset(&self) -> Report {
        let mut c = self.lock();
        let report = Report {
            window_unique: c.window_unique,
            window_duplicates: c.window_duplicates,
            cumulative_unique: c.cumulative_unique,
        };
        c.window_unique = 0;
        c.window_duplicates = 0;
        report
    }

    /// Reads the counters without resetting anything.
    pub fn snapshot(&self) -> Report {
        let c = self.lock();
        Report {
            window_unique: c.window_unique,
            window_duplicates: c.window_duplicates,
            cumulative_unique: c.cumulative_unique,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // The critical sections cannot panic, but a poisoned lock must not
        // take the whole pipeline down with it.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
