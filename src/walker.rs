//! Image walking
//!
//! Called once per loaded image: visits every section, skips everything
//! that is not executable code, and binds the entry hook to each relevant
//! routine found in the remaining sections.

use crate::engine::{EntryHook, HookArgs, Image, Instrumenter, SectionKind};
use crate::filter;
use crate::output::{Diagnostic, LineSink};
use std::sync::Arc;

/// Walks images and registers entry hooks for relevant routines
pub struct ImageWalker {
    hook: Arc<dyn EntryHook>,
    diagnostics: Arc<LineSink>,
}

impl ImageWalker {
    pub fn new(hook: Arc<dyn EntryHook>, diagnostics: Arc<LineSink>) -> Self {
        Self { hook, diagnostics }
    }

    /// Walk one image, returning how many routines were instrumented
    pub fn walk(&self, image: &Image, instrumenter: &mut dyn Instrumenter) -> usize {
        // Owned once per image and shared by every hook bound below
        let image_name: Arc<str> = Arc::from(image.name());
        let mut instrumented = 0;

        for section in image.sections() {
            self.diagnostics.write_line(Diagnostic::Section {
                image: &image_name,
                section: section.name(),
            });

            if section.kind() != SectionKind::Exec {
                continue;
            }

            for routine in section.routines() {
                if !filter::is_relevant(routine.name()) {
                    tracing::trace!("skipping {} in {}", routine.name(), image_name);
                    continue;
                }

                self.diagnostics.write_line(Diagnostic::Function {
                    image: &image_name,
                    function: routine.name(),
                });

                let args = HookArgs {
                    image: Arc::clone(&image_name),
                    function: Arc::from(routine.name()),
                };
                instrumenter.insert_entry_call(routine, Arc::clone(&self.hook), args);
                instrumented += 1;
            }
        }

        tracing::debug!("instrumented {} routines in {}", instrumented, image_name);
        instrumented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Client, Routine, Section};
    use std::fs;
    use tempfile::TempDir;

    struct NoopHook;

    impl EntryHook for NoopHook {
        fn on_entry(&self, _client: &dyn Client, _args: &HookArgs) {}
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(u64, HookArgs)>,
    }

    impl Instrumenter for Recorder {
        fn insert_entry_call(
            &mut self,
            routine: &Routine,
            _hook: Arc<dyn EntryHook>,
            args: HookArgs,
        ) {
            self.calls.push((routine.address(), args));
        }
    }

    fn toy_image() -> Image {
        Image::new(
            "/tmp/toy",
            0,
            vec![
                Section::new(
                    ".plt",
                    SectionKind::Exec,
                    vec![
                        Routine::new("add@plt", 0x1030, 16),
                        Routine::new("mul@plt", 0x1040, 16),
                    ],
                ),
                Section::new(
                    ".text",
                    SectionKind::Exec,
                    vec![
                        Routine::new("_start", 0x1100, 38),
                        Routine::new("main", 0x1200, 120),
                        Routine::new("add", 0x1300, 20),
                        Routine::new("mul", 0x1320, 20),
                        Routine::new("__libc_csu_init", 0x1340, 90),
                    ],
                ),
                Section::new(
                    ".data",
                    SectionKind::Data,
                    vec![Routine::new("looks_like_code", 0x4000, 8)],
                ),
            ],
        )
    }

    #[test]
    fn test_walk_registers_only_relevant_exec_routines() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("functrace.log");
        let diagnostics = Arc::new(LineSink::create(&log_path).unwrap());
        let walker = ImageWalker::new(Arc::new(NoopHook), Arc::clone(&diagnostics));

        let mut recorder = Recorder::default();
        let count = walker.walk(&toy_image(), &mut recorder);

        assert_eq!(count, 2);
        let names: Vec<&str> = recorder
            .calls
            .iter()
            .map(|(_, args)| &*args.function)
            .collect();
        assert_eq!(names, vec!["add", "mul"]);
        assert_eq!(recorder.calls[0].0, 0x1300);
        assert!(recorder.calls.iter().all(|(_, a)| &*a.image == "/tmp/toy"));

        diagnostics.close().unwrap();
        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("[Image:/tmp/toy] [Section:.plt]"));
        assert!(log.contains("[Image:/tmp/toy] [Section:.text]"));
        assert!(log.contains("[Image:/tmp/toy] [Section:.data]"));
        assert!(log.contains("[Image:/tmp/toy] [Function:add]"));
        assert!(log.contains("[Image:/tmp/toy] [Function:mul]"));
        assert!(!log.contains("[Function:main]"));
        assert!(!log.contains("[Function:looks_like_code]"));
    }

    #[test]
    fn test_image_name_storage_is_shared() {
        let diagnostics = Arc::new(LineSink::from_writer(std::io::sink()));
        let walker = ImageWalker::new(Arc::new(NoopHook), diagnostics);

        let mut recorder = Recorder::default();
        walker.walk(&toy_image(), &mut recorder);

        let (_, first) = &recorder.calls[0];
        let (_, second) = &recorder.calls[1];
        assert!(Arc::ptr_eq(&first.image, &second.image));
    }

    #[test]
    fn test_image_without_exec_sections() {
        let diagnostics = Arc::new(LineSink::from_writer(std::io::sink()));
        let walker = ImageWalker::new(Arc::new(NoopHook), diagnostics);
        let image = Image::new(
            "libdata.so",
            0x7f00_0000_0000,
            vec![Section::new(".rodata", SectionKind::Data, Vec::new())],
        );

        let mut recorder = Recorder::default();
        assert_eq!(walker.walk(&image, &mut recorder), 0);
        assert!(recorder.calls.is_empty());
    }
}
