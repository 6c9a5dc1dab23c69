use clap::{Parser, Subcommand};
use coursehub::Config;
use coursehub::model::entity::{
    Category, CategoryCreate, Course, CourseCreate, Lesson, LessonCreate, LessonVideo, UserEntity,
    UserEntityCreateUpdate,
};
use coursehub::model::{CrudRepository, DatabaseError, DbConnection, ModelManager};
use coursehub::utils::slug::slugify;
use coursehub::web::{AuthenticatedUser, UserRole};

#[derive(Parser, Debug)]
#[command(about = "CLI tool for administering the course DB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryCommands,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },

    /// Manage lessons
    Lesson {
        #[command(subcommand)]
        action: LessonCommands,
    },
}

/// User management
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// student, instructor or admin
        #[arg(long, default_value = "student")]
        role: String,
    },
    /// Change the role of an existing user
    Role {
        #[arg(long)]
        username: String,
        #[arg(long)]
        role: String,
    },
}

/// Category management
#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    Add {
        #[arg(long)]
        name: String,
        /// Defaults to the slugified name
        #[arg(long)]
        slug: Option<String>,
    },
}

/// Course management
#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    Add {
        /// Username of the owning instructor
        #[arg(long)]
        instructor: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Category slug
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 0)]
        price_cents: i64,
    },
    /// Make a course visible in the catalogue
    Publish {
        #[arg(long)]
        slug: String,
        /// Hide the course again instead
        #[arg(long, default_value_t = false)]
        unpublish: bool,
    },
}

/// Lesson management
#[derive(Subcommand, Debug)]
pub enum LessonCommands {
    Add {
        /// Slug of the course to attach the lesson to
        #[arg(long)]
        course: String,
        #[arg(long)]
        title: String,
        /// Path to a Markdown file with lesson content
        #[arg(long)]
        file: String,
        /// External video URL
        #[arg(long)]
        video_url: Option<String>,
    },
}

fn parse_role(raw: &str) -> UserRole {
    let role = UserRole::from(raw);
    if role.to_string() != raw {
        eprintln!("unknown role `{raw}`, using `{role}`");
    }
    role
}

async fn course_by_slug(
    mm: &ModelManager,
    actor: &AuthenticatedUser,
    slug: &str,
) -> coursehub::error::AppResult<Course> {
    let id: uuid::Uuid = sqlx::query_scalar("SELECT id FROM courses WHERE slug = $1")
        .bind(slug)
        .fetch_one(mm.executor())
        .await
        .map_err(DatabaseError::SqlxError)?;

    Course::find_by_id(mm, actor, id)
        .await?
        .ok_or_else(|| DatabaseError::SqlxError(sqlx::Error::RowNotFound).into())
}

#[tokio::main]
async fn main() -> coursehub::error::AppResult<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => Config::get_or_init(true).await.app().database_uri().to_string(),
    };
    let db_con = DbConnection::connect(&database_url)?;
    let mm = ModelManager::new(db_con);
    let actor = AuthenticatedUser::admin();

    match args.command {
        Commands::User { action } => match action {
            UserCommands::Add {
                username,
                password,
                role,
            } => {
                let user = UserEntity::create(
                    &mm,
                    &actor,
                    UserEntityCreateUpdate {
                        username,
                        password_hash: coursehub::auth::hash_password(&password)?,
                        role: parse_role(&role),
                    },
                )
                .await?;
                println!("User created: {:?}", user);
            }

            UserCommands::Role { username, role } => {
                let user = UserEntity::find_by_username(&mm, &actor, &username)
                    .await?
                    .ok_or(DatabaseError::SqlxError(sqlx::Error::RowNotFound))?;
                let user = user.set_role(&mm, &actor, parse_role(&role)).await?;
                println!("User updated: {:?}", user);
            }
        },

        Commands::Category { action } => match action {
            CategoryCommands::Add { name, slug } => {
                let slug = slug.unwrap_or_else(|| slugify(&name));
                let category = Category::create(&mm, &actor, CategoryCreate { name, slug }).await?;
                println!("Category created: {:?}", category);
            }
        },

        Commands::Course { action } => match action {
            CourseCommands::Add {
                instructor,
                title,
                description,
                category,
                price_cents,
            } => {
                let instructor = UserEntity::find_by_username(&mm, &actor, &instructor)
                    .await?
                    .ok_or(DatabaseError::SqlxError(sqlx::Error::RowNotFound))?;

                let category_id = match category {
                    Some(slug) => Some(
                        Category::find_by_slug(&mm, &actor, &slug)
                            .await?
                            .ok_or(DatabaseError::SqlxError(sqlx::Error::RowNotFound))?
                            .id(),
                    ),
                    None => None,
                };

                let course = Course::create(
                    &mm,
                    &actor,
                    CourseCreate {
                        instructor_id: instructor.id(),
                        category_id,
                        slug: slugify(&title),
                        title,
                        description,
                        price_cents,
                        is_published: false,
                    },
                )
                .await?;
                println!("Course created: {:?}", course);
            }

            CourseCommands::Publish { slug, unpublish } => {
                let course = course_by_slug(&mm, &actor, &slug).await?;
                let data = CourseCreate {
                    instructor_id: course.instructor_id(),
                    category_id: course.category_id(),
                    title: course.title().to_string(),
                    slug: course.slug().to_string(),
                    description: course.description().to_string(),
                    price_cents: course.price_cents(),
                    is_published: !unpublish,
                };
                let course = course.update(&mm, &actor, data).await?;
                println!("Course updated: {:?}", course);
            }
        },

        Commands::Lesson { action } => match action {
            LessonCommands::Add {
                course,
                title,
                file,
                video_url,
            } => {
                let course = course_by_slug(&mm, &actor, &course).await?;
                let content = std::fs::read_to_string(file)?;
                let order_index = Lesson::next_order_index(&mm, &actor, course.id()).await?;

                let lesson = Lesson::create(
                    &mm,
                    &actor,
                    LessonCreate {
                        course_id: course.id(),
                        slug: slugify(&title),
                        title,
                        content: Some(content),
                        order_index,
                        video: video_url
                            .map(|url| LessonVideo::ExternalUrl { url })
                            .unwrap_or_default(),
                    },
                )
                .await?;
                println!("Lesson created: {:?}", lesson);
            }
        },
    }

    Ok(())
}
