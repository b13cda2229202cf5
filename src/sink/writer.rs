//! Line protocol to any `std::io::Write` (stdout for dry runs, buffers in tests).

use std::io::Write;

use async_trait::async_trait;

use super::{Point, PointSink, SinkError};

pub struct WriterSink<W> {
    writer: W,
    name: String,
    points_written: u64,
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout(), "stdout")
    }
}

impl<W: Write + Send + 'static> WriterSink<W> {
    pub fn new(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer,
            name: name.into(),
            points_written: 0,
        }
    }

    pub fn points_written(&self) -> u64 {
        self.points_written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send + 'static> PointSink for WriterSink<W> {
    async fn write(&mut self, point: Point) -> Result<(), SinkError> {
        let line = point.to_line_protocol()?;
        writeln!(self.writer, "{line}")?;
        self.points_written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_one_line_per_point() {
        let mut sink = WriterSink::new(Vec::new(), "memory");
        sink.write(Point::new("m", 1).field("a", 1.0)).await.unwrap();
        sink.write(Point::new("m", 2).field("a", 2.5)).await.unwrap();
        sink.flush().await.unwrap();

        assert_eq!(sink.points_written(), 2);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "m a=1 1\nm a=2.5 2\n");
    }

    #[tokio::test]
    async fn test_empty_point_is_error_not_written() {
        let mut sink = WriterSink::new(Vec::new(), "memory");
        assert!(sink.write(Point::new("m", 1)).await.is_err());
        assert!(sink.get_ref().is_empty());
        assert_eq!(sink.flush_interval(), None);
    }
}
