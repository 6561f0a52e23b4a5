diesel::table! {
    attachments (id) {
        id -> Uuid,
        inspection_id -> Nullable<Uuid>,
        machine_id -> Nullable<Uuid>,
        #[max_length = 32]
        kind -> Varchar,
        #[max_length = 255]
        filename -> Varchar,
        #[max_length = 100]
        content_type -> Nullable<Varchar>,
        #[max_length = 500]
        storage_key -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    categories (id) {
        id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        description -> Nullable<Text>,
        #[max_length = 255]
        standard -> Nullable<Varchar>,
        color -> Nullable<Int4>,
        seed_version -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    customers (id) {
        id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 255]
        city -> Nullable<Varchar>,
        #[max_length = 255]
        email -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    documents (id) {
        id -> Uuid,
        customer_id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 255]
        filename -> Varchar,
        #[max_length = 100]
        content_type -> Nullable<Varchar>,
        #[max_length = 500]
        storage_key -> Varchar,
        invoice_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    inspection_lines (id) {
        id -> Uuid,
        inspection_id -> Uuid,
        #[max_length = 100]
        section -> Nullable<Varchar>,
        #[max_length = 16]
        serial_no -> Nullable<Varchar>,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 16]
        disposition -> Varchar,
        comment -> Nullable<Text>,
        recommendation -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    inspection_notes (id) {
        id -> Uuid,
        inspection_id -> Uuid,
        #[max_length = 255]
        author -> Varchar,
        body -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    inspections (id) {
        id -> Uuid,
        #[max_length = 64]
        reference -> Varchar,
        customer_id -> Uuid,
        machine_id -> Uuid,
        category_id -> Uuid,
        #[max_length = 16]
        inspection_type -> Varchar,
        #[max_length = 16]
        status -> Varchar,
        start_date -> Date,
        expire_date -> Nullable<Date>,
        last_inspection_date -> Nullable<Date>,
        #[max_length = 255]
        inspector_name -> Nullable<Varchar>,
        inspector_signature -> Nullable<Text>,
        #[max_length = 255]
        location_site -> Nullable<Varchar>,
        doc_report -> Bool,
        doc_maintenance -> Bool,
        doc_load_chart -> Bool,
        customer_signature -> Nullable<Text>,
        #[max_length = 255]
        signed_by -> Nullable<Varchar>,
        signed_date -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    invoices (id) {
        id -> Uuid,
        #[max_length = 100]
        reference -> Varchar,
        #[max_length = 32]
        payment_state -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    line_images (id) {
        id -> Uuid,
        line_id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 500]
        description -> Nullable<Varchar>,
        #[max_length = 100]
        content_type -> Nullable<Varchar>,
        #[max_length = 500]
        storage_key -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    machines (id) {
        id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        #[max_length = 100]
        serial_number -> Nullable<Varchar>,
        #[max_length = 100]
        model_no -> Nullable<Varchar>,
        #[max_length = 100]
        swl -> Nullable<Varchar>,
        #[max_length = 16]
        build_year -> Nullable<Varchar>,
        #[max_length = 255]
        manufacturer -> Nullable<Varchar>,
        #[max_length = 100]
        owner_id_no -> Nullable<Varchar>,
        #[max_length = 500]
        gps_coordinates -> Nullable<Varchar>,
        customer_id -> Uuid,
        category_id -> Uuid,
        recurring -> Bool,
        #[max_length = 16]
        recurring_interval -> Nullable<Varchar>,
        next_due_date -> Nullable<Date>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    questions (id) {
        id -> Uuid,
        category_id -> Nullable<Uuid>,
        machine_id -> Nullable<Uuid>,
        #[max_length = 100]
        section -> Nullable<Varchar>,
        #[max_length = 16]
        serial_no -> Nullable<Varchar>,
        #[max_length = 255]
        name -> Varchar,
        sequence -> Int4,
        #[max_length = 16]
        disposition -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    refresh_tokens (id) {
        id -> Uuid,
        user_id -> Uuid,
        token_hash -> Text,
        issued_at -> Timestamptz,
        expires_at -> Timestamptz,
        revoked_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    sequences (code) {
        #[max_length = 64]
        code -> Varchar,
        #[max_length = 32]
        prefix -> Varchar,
        padding -> Int4,
        next_number -> Int4,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        #[max_length = 100]
        username -> Varchar,
        #[max_length = 255]
        password_hash -> Varchar,
        #[max_length = 16]
        role -> Varchar,
        customer_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(attachments -> inspections (inspection_id));
diesel::joinable!(attachments -> machines (machine_id));
diesel::joinable!(documents -> customers (customer_id));
diesel::joinable!(documents -> invoices (invoice_id));
diesel::joinable!(inspection_lines -> inspections (inspection_id));
diesel::joinable!(inspection_notes -> inspections (inspection_id));
diesel::joinable!(inspections -> categories (category_id));
diesel::joinable!(inspections -> customers (customer_id));
diesel::joinable!(inspections -> machines (machine_id));
diesel::joinable!(line_images -> inspection_lines (line_id));
diesel::joinable!(machines -> categories (category_id));
diesel::joinable!(machines -> customers (customer_id));
diesel::joinable!(questions -> categories (category_id));
diesel::joinable!(questions -> machines (machine_id));
diesel::joinable!(refresh_tokens -> users (user_id));
diesel::joinable!(users -> customers (customer_id));

diesel::allow_tables_to_appear_in_same_query!(
    attachments,
    categories,
    customers,
    documents,
    inspection_lines,
    inspection_notes,
    inspections,
    invoices,
    line_images,
    machines,
    questions,
    refresh_tokens,
    sequences,
    users,
);
