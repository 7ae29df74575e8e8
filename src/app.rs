use crate::components::confirm_reject_control;
use crate::config::Settings;
use crate::image_pipeline::{decode_slice, ImagePipeline};
use crate::message::Message;
use crate::model::{
    load_series, LoadedSeries, RegistryError, StackId, StackRegistry, ValidationWorkflow,
    ViewHandle,
};
use crate::views::{image_panel, stack_panel, SlicePreview};
use iced::widget::text::Wrapping;
use iced::widget::{button, column, container, row, scrollable, text};
use iced::{application, Alignment, Element, Length, Task, Theme};
use rfd::AsyncFileDialog;
use std::collections::BTreeSet;

const APP_TITLE: &str = "Stackcheck";

pub fn run() -> iced::Result {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .try_init();

    let settings = Settings::load().unwrap_or_else(|err| {
        log::warn!("Using default settings: {err}");
        Settings::default()
    });

    application(APP_TITLE, App::update, App::view)
        .theme(App::theme)
        .run_with(move || (App::new(settings), Task::none()))
}

pub struct App {
    registry: StackRegistry,
    workflow: ValidationWorkflow,
    settings: Settings,
    current_slice: usize,
    next_view: u64,
    preview: Option<SlicePreview>,
    last_error: Option<String>,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            registry: StackRegistry::default(),
            workflow: ValidationWorkflow::default(),
            settings,
            current_slice: 0,
            next_view: 0,
            preview: None,
            last_error: None,
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PickFiles => {
                self.settings = Settings::load().unwrap_or_else(|err| {
                    log::warn!("Keeping previous settings: {err}");
                    self.settings
                });
                if !self.settings.file_loading_enabled {
                    self.last_error = Some(String::from("File loading is disabled"));
                    return Task::none();
                }

                Task::perform(
                    async {
                        match AsyncFileDialog::new().pick_files().await {
                            Some(handles) if !handles.is_empty() => load_series(
                                handles
                                    .iter()
                                    .map(|handle| handle.path().to_path_buf())
                                    .collect(),
                            ),
                            _ => Vec::new(),
                        }
                    },
                    Message::FilesLoaded,
                )
            }
            Message::FilesLoaded(results) => {
                let mut errors = Vec::new();
                let mut loaded = None;
                // Two picked directories can share a name; the first one wins
                // and the later one is reported instead of superseding it.
                let mut batch_names = BTreeSet::new();
                for result in results {
                    let result = result.and_then(|series| {
                        if batch_names.insert(series.name.clone()) {
                            Ok(series)
                        } else {
                            Err(RegistryError::DuplicateName(series.name).to_string())
                        }
                    });
                    match result.and_then(|series| self.ingest(series)) {
                        Ok(id) => loaded = Some(id),
                        Err(err) => errors.push(err),
                    }
                }

                self.last_error = if errors.is_empty() {
                    None
                } else {
                    Some(errors.join("\n"))
                };

                match loaded {
                    Some(id) => self.activate(id),
                    None => Task::none(),
                }
            }
            Message::SelectStack(id) => {
                if self.registry.active_id() == Some(id) {
                    return Task::none();
                }
                self.activate(id)
            }
            Message::DiscardStack(id) => {
                if let Err(err) = self.registry.remove(id) {
                    self.last_error = Some(err.to_string());
                    return Task::none();
                }
                if self.registry.active_id().is_some() {
                    return Task::none();
                }
                match self.registry.stacks().first().map(|stack| stack.id()) {
                    Some(next) => self.activate(next),
                    None => {
                        self.workflow.reset(None);
                        self.preview = None;
                        Task::none()
                    }
                }
            }
            Message::PreviousSlice => {
                if self.current_slice == 0 {
                    return Task::none();
                }
                self.current_slice -= 1;
                self.request_decode()
            }
            Message::NextSlice => {
                let len = self.registry.active().map_or(0, |stack| stack.len());
                if self.current_slice + 1 >= len {
                    return Task::none();
                }
                self.current_slice += 1;
                self.request_decode()
            }
            Message::SliceDecoded(ticket, Ok(decoded)) => {
                let pixels = decoded.pixels.clone();
                let applied = self.registry.apply_decoded(ticket, decoded);
                let on_screen = self.registry.active_id() == Some(ticket.stack)
                    && self.current_slice == ticket.index;
                if applied && on_screen {
                    self.preview = Some(SlicePreview::from_pixels(
                        ticket.stack,
                        ticket.index,
                        &pixels,
                    ));
                }
                Task::none()
            }
            Message::SliceDecoded(ticket, Err(err)) => {
                log::warn!("Slice {} of stack {} failed to decode: {err}", ticket.index, ticket.stack);
                if self.registry.active_id() == Some(ticket.stack) {
                    self.last_error = Some(format!("Slice {}: {err}", ticket.index + 1));
                }
                Task::none()
            }
            Message::Submit(outcome) => {
                let result = self
                    .workflow
                    .submit(outcome, self.registry.active())
                    .map_err(|err| err.to_string())
                    .and_then(|decision| {
                        self.registry
                            .record(decision)
                            .map_err(|err| err.to_string())
                    });
                if let Err(err) = result {
                    self.last_error = Some(err);
                }
                Task::none()
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let pick_button = button("Import Image Series").on_press(Message::PickFiles);

        let stack_column = stack_panel(&self.registry);
        let stack_panel = container(scrollable(stack_column))
            .padding(16)
            .width(Length::FillPortion(2));

        let active = self.registry.active();
        let state = active
            .map(|stack| self.workflow.state_for(stack.id()))
            .unwrap_or_default();

        let viewer = column![
            image_panel(active, self.current_slice, self.preview.as_ref()),
            confirm_reject_control(self.settings.display_buttons, state),
        ]
        .spacing(16);
        let image_panel = container(viewer)
            .padding(16)
            .width(Length::FillPortion(5))
            .height(Length::Fill)
            .align_x(Alignment::Center)
            .align_y(Alignment::Center);

        let mut content = column![row![stack_panel, image_panel]
            .spacing(16)
            .width(Length::Fill)
            .height(Length::Fill)]
        .spacing(16);

        if let Some(error) = &self.last_error {
            content = content.push(text(error).size(16).wrapping(Wrapping::Word));
        }

        column![pick_button, content]
            .padding(20)
            .spacing(20)
            .align_x(Alignment::Start)
            .into()
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn ingest(&mut self, series: LoadedSeries) -> Result<StackId, String> {
        self.next_view += 1;
        let view = ViewHandle(self.next_view);
        let id = self
            .registry
            .supersede(series.name, view)
            .map_err(|err| err.to_string())?;

        let stack = self
            .registry
            .get_mut(id)
            .ok_or_else(|| format!("stack {id} vanished during load"))?;
        for slice in series.slices {
            stack.append_raw(slice).map_err(|err| err.to_string())?;
        }
        stack.finalize();
        Ok(id)
    }

    fn activate(&mut self, id: StackId) -> Task<Message> {
        if let Err(err) = self.registry.activate(id) {
            self.last_error = Some(err.to_string());
            return Task::none();
        }
        self.workflow.reset(self.registry.active());
        self.current_slice = 0;
        self.request_decode()
    }

    fn request_decode(&mut self) -> Task<Message> {
        let Some(stack) = self.registry.active_mut() else {
            self.preview = None;
            return Task::none();
        };
        let index = self.current_slice;

        if stack.cached_pixels().is_some_and(|(cached, _)| cached == index) {
            match stack.ensure_pixels(index, &ImagePipeline) {
                Ok(pixels) => {
                    self.preview = Some(SlicePreview::from_pixels(stack.id(), index, &pixels));
                }
                Err(err) => self.last_error = Some(err.to_string()),
            }
            return Task::none();
        }

        match stack.decode_ticket(index) {
            Ok((ticket, raw)) => Task::perform(
                async move { decode_slice(&ImagePipeline, &raw) },
                move |result| Message::SliceDecoded(ticket, result),
            ),
            Err(err) => {
                self.last_error = Some(err.to_string());
                Task::none()
            }
        }
    }
}
