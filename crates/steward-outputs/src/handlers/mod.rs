pub mod add_comment;
pub mod add_label;
pub mod add_reaction;
pub mod approve_pr;
pub mod close_issue;
pub mod convert_to_discussion;
pub mod create_branch;
pub mod create_issue;
pub mod create_pull_request;
pub mod delete_branch;
pub mod merge_pr;
pub mod remove_label;
pub mod reopen_issue;
pub mod update_file;
