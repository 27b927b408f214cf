//! 命令行参数到各平台参数的转换与分发

use common::validate::split_list;
use common::{PushContext, PushError, PushResult, Result};
use log::debug;
use weixin::customer::{CustomerParams, CustomerScope};
use weixin::media::MediaUploadParams;
use weixin::template::{MiniProgramMeta, SubscribeTemplateParams, TemplateParams};
use wxwork::DeliveryOptions;
use wxwork::app::{AppParams, RecallParams};
use wxwork::appchat::AppChatParams;
use wxwork::external_contact::ExternalContactParams;
use wxwork::kf::KfParams;

use crate::cli::*;

impl From<WeixinAuthArgs> for weixin::Auth {
    fn from(args: WeixinAuthArgs) -> Self {
        Self {
            access_token: args.access_token,
            app_id: args.app_id,
            app_secret: args.app_secret,
        }
    }
}

impl From<WorkAuthArgs> for wxwork::Auth {
    fn from(args: WorkAuthArgs) -> Self {
        Self {
            access_token: args.access_token,
            corp_id: args.corp_id,
            corp_secret: args.corp_secret,
        }
    }
}

impl From<DeliveryArgs> for DeliveryOptions {
    fn from(args: DeliveryArgs) -> Self {
        Self {
            enable_id_trans: args.enable_id_trans,
            enable_duplicate_check: args.enable_duplicate_check,
            duplicate_check_interval: args.duplicate_check_interval,
        }
    }
}

/// `|` 分隔的 ID 列表，未指定时为空
fn id_list(raw: Option<&str>) -> Vec<String> {
    raw.map(split_list).unwrap_or_default()
}

fn mini_program(raw: Option<&str>) -> Result<Option<MiniProgramMeta>> {
    raw.map(MiniProgramMeta::parse_flag).transpose()
}

/// 执行一条命令
pub async fn run(ctx: &PushContext, command: Command) -> Result<PushResult> {
    match command {
        Command::Weixin { command } => run_weixin(ctx, command).await,
        Command::WorkWeixin { command } => run_work(ctx, command).await,
        Command::Slack {
            command: SlackCommand::Bot(args),
        } => {
            let params = slack_bot::SendParams {
                url: args.url,
                data: args.data,
            };
            slack_bot::send(ctx, params).await
        }
        Command::Feishu {
            command: FeishuCommand::Bot(args),
        } => {
            let params = feishu_bot::SendParams {
                token: args.access_token,
                secret: args.secret,
                msg_type: args.msg_type,
                data: args.data,
            };
            feishu_bot::send(ctx, params).await
        }
    }
}

async fn run_weixin(ctx: &PushContext, command: WeixinCommand) -> Result<PushResult> {
    match command {
        WeixinCommand::Token(args) => {
            let params = weixin::token::TokenParams {
                app_id: args.app_id,
                app_secret: args.app_secret,
            };
            let credential = weixin::token::fetch_access_token(ctx, params).await?;
            Ok(PushResult::with_response(credential))
        }
        WeixinCommand::OffiAccount {
            command: OffiAccountCommand::Customer(args),
        } => {
            let params = CustomerParams {
                auth: args.auth.into(),
                scope: CustomerScope::OfficialAccount,
                to_user: args.to_user,
                msg_type: args.msg_type,
                kf_account: args.kf_account,
                data: args.data,
            };
            weixin::customer::send(ctx, params).await
        }
        WeixinCommand::OffiAccount {
            command: OffiAccountCommand::Template { command },
        } => match command {
            TemplateCommand::Send(args) => {
                let params = TemplateParams {
                    mini: mini_program(args.mini.as_deref())?,
                    auth: args.auth.into(),
                    to_user: args.to_user,
                    template_id: args.template_id,
                    url: args.url,
                    client_msg_id: args.client_msg_id,
                    color: args.color,
                    data: args.data,
                };
                weixin::template::send(ctx, params).await
            }
            TemplateCommand::Subscribe(args) => {
                let params = SubscribeTemplateParams {
                    mini: mini_program(args.mini.as_deref())?,
                    auth: args.auth.into(),
                    to_user: args.to_user,
                    template_id: args.template_id,
                    scene: args.scene,
                    title: args.title,
                    url: args.url,
                    data: args.data,
                };
                weixin::template::subscribe(ctx, params).await
            }
        },
        WeixinCommand::MiniProgram { command } => match command {
            MiniProgramCommand::Customer(args) => {
                let params = CustomerParams {
                    auth: args.auth.into(),
                    scope: CustomerScope::MiniProgram,
                    to_user: args.to_user,
                    msg_type: args.msg_type,
                    kf_account: None,
                    data: args.data,
                };
                weixin::customer::send(ctx, params).await
            }
            MiniProgramCommand::Subscribe(args) => {
                let params = weixin::subscribe::SubscribeParams {
                    auth: args.auth.into(),
                    to_user: args.to_user,
                    template_id: args.template_id,
                    page: args.page,
                    mini_program_state: args.mini_program_state,
                    lang: args.lang,
                    data: args.data,
                };
                weixin::subscribe::send(ctx, params).await
            }
        },
        WeixinCommand::Media {
            command: MediaCommand::Upload(args),
        } => {
            let params = MediaUploadParams {
                auth: args.auth.into(),
                media_type: args.media_type,
                file: args.file,
            };
            weixin::media::upload(ctx, params).await
        }
    }
}

async fn run_work(ctx: &PushContext, command: WorkCommand) -> Result<PushResult> {
    match command {
        WorkCommand::Token(args) => {
            let params = wxwork::token::TokenParams {
                corp_id: args.corp_id,
                corp_secret: args.corp_secret,
            };
            let credential = wxwork::token::fetch_access_token(ctx, params).await?;
            Ok(PushResult::with_response(credential))
        }
        WorkCommand::App(args) => run_app(ctx, args).await,
        WorkCommand::AppChat(args) => {
            let params = AppChatParams {
                auth: args.auth.into(),
                chat_id: args.chat_id,
                msg_type: args.msg_type,
                safe: args.safe,
                data: args.data,
            };
            wxwork::appchat::send(ctx, params).await
        }
        WorkCommand::ExternalContact(args) => {
            let params = ExternalContactParams {
                auth: args.auth.into(),
                recv_scope: args.recv_scope,
                to_parent_user_id: id_list(args.to_parent_user_id.as_deref()),
                to_student_user_id: id_list(args.to_student_user_id.as_deref()),
                to_party: id_list(args.to_party.as_deref()),
                to_all: args.to_all,
                agent_id: args.agent_id,
                msg_type: args.msg_type,
                options: args.delivery.into(),
                data: args.data,
            };
            wxwork::external_contact::send(ctx, params).await
        }
        WorkCommand::Customer(args) => {
            let params = KfParams {
                auth: args.auth.into(),
                to_user: args.to_user,
                open_kf_id: args.open_kf_id,
                msg_id: args.msg_id,
                msg_type: args.msg_type,
                data: args.data,
            };
            wxwork::kf::send(ctx, params).await
        }
        WorkCommand::Bot {
            command: BotCommand::Send(args),
        } => {
            let params = wxwork_group_bot::SendParams {
                key: args.key,
                msg_type: args.msg_type,
                at_user: id_list(args.at_user.as_deref()),
                at_mobile: id_list(args.at_mobile.as_deref()),
                data: args.data,
            };
            wxwork_group_bot::send(ctx, params).await
        }
        WorkCommand::Bot {
            command: BotCommand::Upload(args),
        } => {
            let params = wxwork_group_bot::UploadParams {
                key: args.key,
                media_type: args.media_type,
                file: args.file,
            };
            wxwork_group_bot::upload(ctx, params).await
        }
    }
}

async fn run_app(ctx: &PushContext, args: AppArgs) -> Result<PushResult> {
    if let Some(AppCommand::Undo { msg_id }) = args.command {
        let params = RecallParams {
            auth: args.auth.into(),
            msg_id,
        };
        return wxwork::app::recall(ctx, params).await;
    }

    let (Some(agent_id), Some(msg_type), Some(data)) = (args.agent_id, args.msg_type, args.data)
    else {
        return Err(PushError::validation("agent_id, msg_type and data are required"));
    };
    debug!("work weixin app message to agent {agent_id}");
    let params = AppParams {
        auth: args.auth.into(),
        to_user: id_list(args.to_user.as_deref()),
        to_party: id_list(args.to_party.as_deref()),
        to_tag: id_list(args.to_tag.as_deref()),
        agent_id,
        msg_type,
        safe: args.safe,
        options: args.delivery.into(),
        data,
    };
    wxwork::app::send(ctx, params).await
}
