use console::style;
use std::io::Write;
use termimad::MadSkin;
use toolcall_core::Renderer;

/// Writes turn output to a terminal: markdown for text, a caption link for
/// images, raw chunks while streaming.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    skin: MadSkin,
    streaming: bool,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            skin: MadSkin::default(),
            streaming: false,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn text_block(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", self.skin.term_text(text));
        let _ = self.out.flush();
    }

    fn image(&mut self, url: &str, caption: &str) {
        let _ = writeln!(
            self.out,
            "  {} {}\n    {}",
            style("▣").cyan(),
            style(caption).bold(),
            style(url).underlined().dim()
        );
    }

    fn stream_chunk(&mut self, chunk: &str) {
        self.streaming = true;
        let _ = write!(self.out, "{chunk}");
        let _ = self.out.flush();
    }

    fn finish_stream(&mut self) {
        if std::mem::take(&mut self.streaming) {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
    }

    fn termination_notice(&mut self, notice: &str) {
        let _ = writeln!(self.out, "{}", style(notice).yellow().bold());
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(f: impl FnOnce(&mut TerminalRenderer<Vec<u8>>)) -> String {
        let mut renderer = TerminalRenderer::new(Vec::new());
        f(&mut renderer);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn chunks_are_written_verbatim_and_closed_with_newline() {
        let out = rendered(|r| {
            r.stream_chunk("Sunny ");
            r.stream_chunk("in Lahore.");
            r.finish_stream();
        });
        assert_eq!(out, "Sunny in Lahore.\n");
    }

    #[test]
    fn finish_without_chunks_writes_nothing() {
        assert_eq!(rendered(|r| r.finish_stream()), "");
    }

    #[test]
    fn image_shows_caption_and_url() {
        let out = rendered(|r| r.image("https://img.example/cat.jpg", "Image related to cats"));
        assert!(out.contains("Image related to cats"));
        assert!(out.contains("https://img.example/cat.jpg"));
    }

    #[test]
    fn notice_and_text_are_printed() {
        let out = rendered(|r| {
            r.text_block("Hello there");
            r.termination_notice("Execution stopped as requested.");
        });
        assert!(out.contains("Hello there"));
        assert!(out.contains("Execution stopped as requested."));
    }
}
