pub fn main() -> iced::Result {
    stackcheck::app::run()
}
