/// Vulkan Debug Messenger - routes validation layer messages into the engine logger
///
/// The callback state (filters, counters, duplicate tracker) lives in a boxed
/// `DebugState` owned by the device and handed to Vulkan as the messenger's
/// user-data pointer. Nothing here is process-wide: two devices keep separate
/// statistics and settings.
///
/// Strict mode never panics inside the callback (unwinding through the driver
/// aborts the process). The first error is recorded and the device raises it
/// once the Vulkan call that produced it has returned.

use ash::vk;
use colored::*;
use frameflight_engine::frameflight::device::{
    DebugMessageFilter, DebugSeverity, DeviceConfig, ValidationStats,
};
use frameflight_engine::frameflight::{Error, Result};
use frameflight_engine::{engine_error, engine_info, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

const SOURCE: &str = "frameflight::vulkan::validation";

/// Lock ignoring poison: the callback must keep working after a panicking test
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Thread-safe validation statistics tracker
#[derive(Default)]
struct StatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl StatsTracker {
    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }
}

/// Per-device state reachable from the debug callback
pub(crate) struct DebugState {
    severity: DebugSeverity,
    filter: DebugMessageFilter,
    file: Option<String>,
    enable_stats: bool,
    panic_on_error: bool,
    stats: StatsTracker,
    /// Occurrences per message text, for the `[xN]` repeat marker
    tracker: Mutex<FxHashMap<String, u32>>,
    /// First error seen in strict mode, raised by the device
    strict_violation: Mutex<Option<String>>,
}

impl DebugState {
    pub(crate) fn new(config: &DeviceConfig) -> Self {
        Self {
            severity: config.debug_severity,
            filter: config.debug_message_filter,
            file: config.debug_output.file_path().map(str::to_string),
            enable_stats: config.enable_validation_stats,
            panic_on_error: config.panic_on_validation_error,
            stats: StatsTracker::default(),
            tracker: Mutex::new(FxHashMap::default()),
            strict_violation: Mutex::new(None),
        }
    }

    pub(crate) fn stats(&self) -> ValidationStats {
        self.stats.snapshot()
    }

    /// Number of distinct messages reported more than once
    pub(crate) fn duplicate_messages(&self) -> u32 {
        lock(&self.tracker).values().filter(|&&count| count > 1).count() as u32
    }

    pub(crate) fn take_strict_violation(&self) -> Option<String> {
        lock(&self.strict_violation).take()
    }

    fn severity_enabled(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
        severity_flags(self.severity).intersects(severity)
    }

    fn category_enabled(&self, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> bool {
        if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            self.filter.show_validation
        } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            self.filter.show_performance
        } else {
            self.filter.show_general
        }
    }

    /// Filter, count and forward one message
    ///
    /// Returns false when the message was filtered out.
    pub(crate) fn handle_message(
        &self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
        message_id: &str,
        message: &str,
    ) -> bool {
        if !self.severity_enabled(severity) || !self.category_enabled(message_type) {
            return false;
        }

        let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            "Validation"
        } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            "Performance"
        } else {
            "General"
        };

        let occurrences = if self.enable_stats {
            let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
                &self.stats.errors
            } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
                &self.stats.warnings
            } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
                &self.stats.info
            } else {
                &self.stats.verbose
            };
            counter.fetch_add(1, Ordering::Relaxed);

            let mut tracker = lock(&self.tracker);
            let count = tracker.entry(message.to_string()).or_insert(0);
            *count += 1;
            *count
        } else {
            1
        };

        let repeat = if occurrences > 1 {
            format!(" [x{}]", occurrences)
        } else {
            String::new()
        };

        let line = format!("[{}] {}{}: {}", type_str, message_id, repeat, message);
        let severity_str = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            engine_error!(SOURCE, "{}", line);
            "ERROR"
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            engine_warn!(SOURCE, "{}", line);
            "WARNING"
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            engine_info!(SOURCE, "{}", line);
            "INFO"
        } else {
            engine_trace!(SOURCE, "{}", line);
            "VERBOSE"
        };

        if let Some(path) = &self.file {
            write_to_file(path, &format!("[VULKAN {}] {}", severity_str, line));
        }

        if self.panic_on_error && severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            let mut violation = lock(&self.strict_violation);
            if violation.is_none() {
                *violation = Some(format!("{} [{}]: {}", message_id, type_str, message));
            }
        }

        true
    }
}

/// Messenger severity mask for a configured level
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Vulkan debug messenger callback
///
/// `user_data` is the `DebugState` boxed inside `DebugMessenger`.
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if user_data.is_null() || p_callback_data.is_null() {
        return vk::FALSE;
    }
    let state = &*(user_data as *const DebugState);

    let callback_data = &*p_callback_data;
    let message_id = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };

    state.handle_message(message_severity, message_type, message_id, message);

    vk::FALSE
}

fn write_to_file(path: &str, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", line);
    }
}

/// Debug-utils messenger plus the state its callback reads
pub(crate) struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    state: Box<DebugState>,
}

impl DebugMessenger {
    pub(crate) fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &DeviceConfig,
    ) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let state = Box::new(DebugState::new(config));
        let user_data = &*state as *const DebugState as *mut std::os::raw::c_void;

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback))
            .user_data(user_data);

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| {
                engine_error!("frameflight::vulkan", "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?;

        Ok(Self { loader, messenger, state })
    }

    pub(crate) fn state(&self) -> &DebugState {
        &self.state
    }

    /// Destroy the messenger; must run before the instance goes away
    pub(crate) unsafe fn destroy(&mut self) {
        self.loader.destroy_debug_utils_messenger(self.messenger, None);
        self.messenger = vk::DebugUtilsMessengerEXT::null();
    }
}

/// Print a colored validation statistics report to stdout
pub fn print_validation_stats_report(stats: &ValidationStats, duplicate_messages: u32) {
    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());

    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    if duplicate_messages > 0 {
        println!("\n  {} message(s) appeared multiple times", duplicate_messages);
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
