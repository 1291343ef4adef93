diesel::table! {
    sites (id) {
        id -> Integer,
        company_id -> Text,
        name -> Text,
        is_active -> Bool,
        created_at -> Timestamp,
    }
}

diesel::table! {
    task_templates (id) {
        id -> Integer,
        company_id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        frequency -> Text,            // daily | weekly | monthly | triggered
        schedule_day -> Nullable<Integer>,
        daypart -> Text,
        evidence_types -> Text,       // JSON array
        requires_sop -> Bool,
        is_active -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    template_sites (template_id, site_id) {
        template_id -> Integer,
        site_id -> Integer,
    }
}

diesel::table! {
    task_instances (id) {
        id -> Integer,
        template_id -> Integer,
        site_id -> Integer,
        due_date -> Date,
        due_daypart -> Text,
        due_at -> Timestamp,
        status -> Text,                    // pending | completed
        completed_at -> Nullable<Timestamp>,
        completed_by -> Nullable<Text>,
        completed_data -> Nullable<Text>,  // JSON snapshot of the submission
        created_at -> Timestamp,
    }
}

diesel::table! {
    compliance_records (id) {
        id -> Text,
        instance_id -> Integer,
        site_id -> Integer,
        user_id -> Text,
        action -> Text,
        data -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    server_settings (id) {
        id -> Integer,
        auto_generate_enabled -> Bool,
        generation_interval_seconds -> BigInt,
        utc_offset_minutes -> Integer,
    }
}

diesel::joinable!(template_sites -> task_templates (template_id));
diesel::joinable!(template_sites -> sites (site_id));
diesel::joinable!(task_instances -> task_templates (template_id));
diesel::joinable!(task_instances -> sites (site_id));
diesel::joinable!(compliance_records -> task_instances (instance_id));

diesel::allow_tables_to_appear_in_same_query!(
    sites,
    task_templates,
    template_sites,
    task_instances,
    compliance_records,
    server_settings,
);
