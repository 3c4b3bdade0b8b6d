//! Advisory warnings reach the `log` facade exactly once per empty loop.
//!
//! Kept in its own test binary: it installs the process-wide logger.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;
use tapec::{tokenize, CompileWarning, IrBuilder, Language};

struct WarningCapture {
    lines: Mutex<Vec<String>>,
}

impl Log for WarningCapture {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if record.level() == Level::Warn {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static CAPTURE: WarningCapture = WarningCapture {
    lines: Mutex::new(Vec::new()),
};

#[test]
fn test_nested_empty_loop_is_logged_once() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Warn);

    // The empty loop sits inside two simple loops, each of which is
    // summarised by lowering its body again.
    let stream = tokenize("+[>[>[]<]<-]", Language::Brainfuck.table()).unwrap();
    let mut builder = IrBuilder::new();
    builder.build(&stream).unwrap();
    assert_eq!(builder.into_warnings(), vec![CompileWarning::InfiniteLoopPattern { index: 5 }]);

    let lines = CAPTURE.lines.lock().unwrap();
    assert_eq!(lines.len(), 1, "{:?}", *lines);
    assert!(lines[0].contains("loop at instruction 5 has an empty body"), "{}", lines[0]);
}
