/// Output surface for a turn.
pub trait Renderer: Send {
    fn text_block(&mut self, text: &str);

    fn image(&mut self, url: &str, caption: &str);

    fn stream_chunk(&mut self, chunk: &str);

    /// Called once after the last chunk of a streamed answer.
    fn finish_stream(&mut self) {}

    fn termination_notice(&mut self, notice: &str);
}
