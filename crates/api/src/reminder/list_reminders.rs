use crate::error::ChimeError;
use crate::shared::usecase::UseCase;
use chime_infra::{ChimeContext, RoomReminder};

#[derive(Debug)]
pub struct ListRemindersUseCase {
    pub room_id: String,
}

#[derive(Debug)]
pub enum UseCaseErrors {}

impl From<UseCaseErrors> for ChimeError {
    fn from(e: UseCaseErrors) -> Self {
        match e {}
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for ListRemindersUseCase {
    type Response = Vec<RoomReminder>;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &ChimeContext) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        Ok(ctx.registry.list_room(&self.room_id, &ctx.scheduler, now))
    }
}
